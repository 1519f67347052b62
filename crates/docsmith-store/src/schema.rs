//! Idempotent schema application.

use rusqlite::Connection;

use crate::StoreError;

/// Apply the schema. Safe to run on every open.
pub(crate) fn apply(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS repositories (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id           TEXT    NOT NULL,
            name              TEXT    NOT NULL,
            provider_repo_id  INTEGER NOT NULL,
            full_name         TEXT    NOT NULL,
            html_url          TEXT,
            webhook_id        INTEGER,
            webhook_error     TEXT,
            merkle_root       TEXT,
            created_at        TEXT    NOT NULL,
            UNIQUE (user_id, provider_repo_id)
        );

        CREATE TABLE IF NOT EXISTS repo_files (
            repo_id          INTEGER NOT NULL,
            path             TEXT    NOT NULL,
            name             TEXT    NOT NULL,
            size             INTEGER NOT NULL,
            content_identity TEXT,
            content          TEXT,
            updated_at       TEXT    NOT NULL,
            PRIMARY KEY (repo_id, path)
        );

        CREATE TABLE IF NOT EXISTS repo_documents (
            repo_name  TEXT NOT NULL,
            path       TEXT NOT NULL,
            content    TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (repo_name, path)
        );

        CREATE TABLE IF NOT EXISTS doc_status (
            repo_name  TEXT PRIMARY KEY,
            status     TEXT    NOT NULL,
            progress   INTEGER NOT NULL,
            message    TEXT    NOT NULL,
            updated_at TEXT    NOT NULL
        );
        "#,
    )?;
    Ok(())
}
