//! Raw ingested source files, keyed by (repository id, path).

use chrono::Utc;
use rusqlite::params;

use docsmith_core::RepoFileRecord;

use crate::{Database, StoreError};

impl Database {
    /// Insert-or-replace by the (repo, path) primary key.
    pub async fn upsert_repo_file(&self, file: &RepoFileRecord) -> Result<(), StoreError> {
        let conn = self.lock().await?;
        conn.execute(
            "INSERT INTO repo_files \
             (repo_id, path, name, size, content_identity, content, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT (repo_id, path) DO UPDATE SET \
             name = excluded.name, size = excluded.size, \
             content_identity = excluded.content_identity, \
             content = excluded.content, updated_at = excluded.updated_at",
            params![
                file.repo_id,
                file.path,
                file.name,
                file.size as i64,
                file.content_identity,
                file.content,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub async fn delete_repo_file(&self, repo_id: i64, path: &str) -> Result<(), StoreError> {
        let conn = self.lock().await?;
        conn.execute(
            "DELETE FROM repo_files WHERE repo_id = ?1 AND path = ?2",
            params![repo_id, path],
        )?;
        Ok(())
    }

    pub async fn repo_file_paths(&self, repo_id: i64) -> Result<Vec<String>, StoreError> {
        let conn = self.lock().await?;
        let mut stmt =
            conn.prepare("SELECT path FROM repo_files WHERE repo_id = ?1 ORDER BY path")?;
        let rows = stmt
            .query_map(params![repo_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn repo_file_count(&self, repo_id: i64) -> Result<u64, StoreError> {
        let conn = self.lock().await?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM repo_files WHERE repo_id = ?1",
            params![repo_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
