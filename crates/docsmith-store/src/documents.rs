//! Generated markdown documents, keyed by (repository name, path).
//!
//! Unlike status writes, document writes propagate their errors: the
//! orchestrator turns a failed upsert into an `error` run status.

use chrono::{DateTime, Utc};
use rusqlite::params;

use docsmith_core::RepoDocument;

use crate::{Database, StoreError};

/// A stored document without its repository name, as listed per repo.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRow {
    pub path: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

impl Database {
    pub async fn upsert_document(
        &self,
        repo_name: &str,
        path: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        let conn = self.lock().await?;
        conn.execute(
            "INSERT INTO repo_documents (repo_name, path, content, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (repo_name, path) DO UPDATE SET \
             content = excluded.content, updated_at = excluded.updated_at",
            params![repo_name, path, content, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn delete_document(&self, repo_name: &str, path: &str) -> Result<(), StoreError> {
        let conn = self.lock().await?;
        conn.execute(
            "DELETE FROM repo_documents WHERE repo_name = ?1 AND path = ?2",
            params![repo_name, path],
        )?;
        Ok(())
    }

    /// Whether any documentation exists for the repository. Unconfigured
    /// stores report `false` so the reconciler never upgrades on their say.
    pub async fn documents_exist(&self, repo_name: &str) -> Result<bool, StoreError> {
        if !self.is_configured() {
            return Ok(false);
        }
        let conn = self.lock().await?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM repo_documents WHERE repo_name = ?1",
            params![repo_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub async fn list_documents(&self, repo_name: &str) -> Result<Vec<DocumentRow>, StoreError> {
        if !self.is_configured() {
            return Ok(Vec::new());
        }
        let conn = self.lock().await?;
        let mut stmt = conn.prepare(
            "SELECT path, content, updated_at FROM repo_documents \
             WHERE repo_name = ?1 ORDER BY path",
        )?;
        let rows = stmt
            .query_map(params![repo_name], |row| {
                let updated_at: String = row.get(2)?;
                Ok(DocumentRow {
                    path: row.get(0)?,
                    content: row.get(1)?,
                    updated_at: DateTime::parse_from_rfc3339(&updated_at)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Full records, including the repository name.
    pub async fn list_repo_documents(
        &self,
        repo_name: &str,
    ) -> Result<Vec<RepoDocument>, StoreError> {
        let rows = self.list_documents(repo_name).await?;
        Ok(rows
            .into_iter()
            .map(|row| RepoDocument {
                repo_name: repo_name.to_string(),
                path: row.path,
                content: row.content,
                updated_at: row.updated_at,
            })
            .collect())
    }
}
