//! SQLite persistence layer.
//!
//! One `Database` handle serves all four projections: repositories, ingested
//! repo files, generated documents and generation status. Natural keys are
//! encoded as UNIQUE/PRIMARY KEY constraints in the schema, so every write
//! path is an idempotent upsert rather than application-level dedup.
//!
//! When no `DATABASE_URL` is configured the handle runs in unconfigured
//! mode: reads return defaults, writes log and no-op, nothing crashes.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use docsmith_core::DocsmithError;

mod documents;
mod repos;
mod repo_files;
mod schema;
mod status;

pub use documents::DocumentRow;

/// Message surfaced by reads when the relational store is not configured.
pub const NOT_CONFIGURED_MESSAGE: &str = "Database not configured";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database not configured")]
    NotConfigured,
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<StoreError> for DocsmithError {
    fn from(err: StoreError) -> Self {
        DocsmithError::StorageUnavailable(err.to_string())
    }
}

/// Shared handle to the relational store.
#[derive(Clone)]
pub struct Database {
    inner: Option<Arc<Mutex<Connection>>>,
}

impl Database {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        let conn = Connection::open(path)?;
        schema::apply(&conn)?;
        Ok(Self {
            inner: Some(Arc::new(Mutex::new(conn))),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::apply(&conn)?;
        Ok(Self {
            inner: Some(Arc::new(Mutex::new(conn))),
        })
    }

    /// Handle that performs no persistence at all.
    pub fn unconfigured() -> Self {
        Self { inner: None }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    pub(crate) async fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        match &self.inner {
            Some(conn) => Ok(conn.lock().await),
            None => Err(StoreError::NotConfigured),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("configured", &self.is_configured())
            .finish()
    }
}
