//! Repository rows: one per (user, provider repository).

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use docsmith_core::{RepoRef, Repository};

use crate::{Database, StoreError};

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<Repository> {
    let created_at: String = row.get("created_at")?;
    Ok(Repository {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        provider_repo_id: row.get("provider_repo_id")?,
        full_name: row.get("full_name")?,
        html_url: row.get("html_url")?,
        webhook_id: row.get("webhook_id")?,
        webhook_error: row.get("webhook_error")?,
        merkle_root: row.get("merkle_root")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

const SELECT_COLUMNS: &str = "id, user_id, name, provider_repo_id, full_name, html_url, \
                              webhook_id, webhook_error, merkle_root, created_at";

impl Database {
    /// Insert a repository on first selection; a repeat selection returns the
    /// existing row untouched. The boolean reports whether a row was created.
    pub async fn insert_repository(
        &self,
        user_id: &str,
        repo: &RepoRef,
    ) -> Result<(Repository, bool), StoreError> {
        let conn = self.lock().await?;

        if let Some(existing) = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM repositories \
                     WHERE user_id = ?1 AND provider_repo_id = ?2"
                ),
                params![user_id, repo.id],
                repository_from_row,
            )
            .optional()?
        {
            return Ok((existing, false));
        }

        conn.execute(
            "INSERT INTO repositories \
             (user_id, name, provider_repo_id, full_name, html_url, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                repo.name,
                repo.id,
                repo.full_name,
                repo.html_url,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let inserted = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM repositories WHERE id = ?1"),
            params![conn.last_insert_rowid()],
            repository_from_row,
        )?;
        Ok((inserted, true))
    }

    pub async fn repository_by_id(&self, id: i64) -> Result<Option<Repository>, StoreError> {
        let conn = self.lock().await?;
        Ok(conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM repositories WHERE id = ?1"),
                params![id],
                repository_from_row,
            )
            .optional()?)
    }

    /// Look up by the provider's repository id, any owning user. Used by the
    /// webhook path, where only the provider identity is known.
    pub async fn repository_by_provider_id(
        &self,
        provider_repo_id: i64,
    ) -> Result<Option<Repository>, StoreError> {
        let conn = self.lock().await?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM repositories WHERE provider_repo_id = ?1"
                ),
                params![provider_repo_id],
                repository_from_row,
            )
            .optional()?)
    }

    pub async fn repositories_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Repository>, StoreError> {
        let conn = self.lock().await?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM repositories WHERE user_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params![user_id], repository_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Record a successful webhook registration. Clears any prior error, so
    /// a non-null webhook id never coexists with a webhook error.
    pub async fn set_webhook_id(&self, repo_id: i64, webhook_id: i64) -> Result<(), StoreError> {
        let conn = self.lock().await?;
        conn.execute(
            "UPDATE repositories SET webhook_id = ?2, webhook_error = NULL WHERE id = ?1",
            params![repo_id, webhook_id],
        )?;
        Ok(())
    }

    /// Record the last webhook registration failure.
    pub async fn set_webhook_error(&self, repo_id: i64, error: &str) -> Result<(), StoreError> {
        let conn = self.lock().await?;
        conn.execute(
            "UPDATE repositories SET webhook_error = ?2 WHERE id = ?1 AND webhook_id IS NULL",
            params![repo_id, error],
        )?;
        Ok(())
    }

    pub async fn set_merkle_root(&self, repo_id: i64, root: &str) -> Result<(), StoreError> {
        let conn = self.lock().await?;
        conn.execute(
            "UPDATE repositories SET merkle_root = ?2 WHERE id = ?1",
            params![repo_id, root],
        )?;
        Ok(())
    }
}
