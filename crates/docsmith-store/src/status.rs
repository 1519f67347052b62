//! Durable projection of per-repository generation progress.
//!
//! `set_status` is best-effort by contract: progress reporting must never
//! abort a generation run, so storage failures here are logged and
//! swallowed. `status_for` likewise never fails the caller; a broken store
//! surfaces as a transient `error` status in the response body.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::warn;

use docsmith_core::{clamp_progress, DocStatus, StatusRecord};

use crate::{Database, StoreError, NOT_CONFIGURED_MESSAGE};

impl Database {
    /// Upsert the status row, clamping progress into `[0, 100]`.
    pub async fn set_status(
        &self,
        repo_name: &str,
        status: DocStatus,
        progress: i64,
        message: &str,
    ) {
        if !self.is_configured() {
            warn!(repo = repo_name, "skipping status write: {NOT_CONFIGURED_MESSAGE}");
            return;
        }
        if let Err(err) = self
            .try_set_status(repo_name, status, clamp_progress(progress), message)
            .await
        {
            warn!(repo = repo_name, error = %err, "failed to persist status update");
        }
    }

    async fn try_set_status(
        &self,
        repo_name: &str,
        status: DocStatus,
        progress: u8,
        message: &str,
    ) -> Result<(), StoreError> {
        let conn = self.lock().await?;
        conn.execute(
            "INSERT INTO doc_status (repo_name, status, progress, message, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (repo_name) DO UPDATE SET \
             status = excluded.status, progress = excluded.progress, \
             message = excluded.message, updated_at = excluded.updated_at",
            params![
                repo_name,
                status.as_str(),
                progress as i64,
                message,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Current status, defaulting to `not_started` for unknown repositories.
    pub async fn status_for(&self, repo_name: &str) -> StatusRecord {
        if !self.is_configured() {
            let mut record = StatusRecord::not_started();
            record.message = NOT_CONFIGURED_MESSAGE.to_string();
            return record;
        }
        match self.try_status_for(repo_name).await {
            Ok(Some(record)) => record,
            Ok(None) => StatusRecord::not_started(),
            Err(err) => {
                warn!(repo = repo_name, error = %err, "failed to read status");
                StatusRecord::transient_error(format!("status lookup failed: {err}"))
            }
        }
    }

    async fn try_status_for(&self, repo_name: &str) -> Result<Option<StatusRecord>, StoreError> {
        let conn = self.lock().await?;
        Ok(conn
            .query_row(
                "SELECT status, progress, message, updated_at FROM doc_status \
                 WHERE repo_name = ?1",
                params![repo_name],
                |row| {
                    let status: String = row.get(0)?;
                    let progress: i64 = row.get(1)?;
                    let message: String = row.get(2)?;
                    let updated_at: String = row.get(3)?;
                    Ok(StatusRecord {
                        status: DocStatus::from_str_lossy(&status),
                        progress: clamp_progress(progress),
                        message,
                        last_updated: DateTime::parse_from_rfc3339(&updated_at)
                            .map(|t| t.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                    })
                },
            )
            .optional()?)
    }
}
