//! Shared records for repositories, ingested files, generated documents and
//! push-driven change sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Files larger than this are never ingested with content and never
/// contribute to the Merkle commitment.
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// A provider repository as selected by the user.
///
/// Provider payloads are decoded into this at the adapter boundary; loosely
/// typed JSON never travels further into the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoRef {
    /// Stable provider repository id.
    pub id: i64,
    /// Short repository name.
    pub name: String,
    /// Provider "owner/name".
    pub full_name: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// The persisted representation of a selected repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    #[serde(rename = "githubRepoId")]
    pub provider_repo_id: i64,
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "htmlUrl")]
    pub html_url: Option<String>,
    #[serde(rename = "webhookId")]
    pub webhook_id: Option<i64>,
    #[serde(rename = "webhookError")]
    pub webhook_error: Option<String>,
    #[serde(rename = "merkleRoot")]
    pub merkle_root: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A raw source file materialized by the ingestor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoFileRecord {
    pub repo_id: i64,
    pub path: String,
    pub name: String,
    pub size: u64,
    /// Provider-supplied content identity (the blob sha).
    pub content_identity: Option<String>,
    /// Textual content; `None` when the file exceeded [`MAX_FILE_SIZE`] or
    /// the fetch failed.
    pub content: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Generated markdown for a single source file or tutorial chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoDocument {
    pub repo_name: String,
    pub path: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

/// What happened to a file in a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One changed file in a push event or commit diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub status: ChangeKind,
    #[serde(default)]
    pub content_identity: Option<String>,
}

/// Derive the documentation path for a source file: the extension is
/// replaced with `.md`, so removing `src/b.ts` removes `src/b.md`.
pub fn doc_path_for_source(path: &str) -> String {
    match path.rsplit_once('.') {
        // Guard against a dot inside a directory segment ("v1.2/readme").
        Some((stem, ext)) if !ext.contains('/') => format!("{stem}.md"),
        _ => format!("{path}.md"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_path_replaces_extension() {
        assert_eq!(doc_path_for_source("src/b.ts"), "src/b.md");
        assert_eq!(doc_path_for_source("README.md"), "README.md");
        assert_eq!(doc_path_for_source("Makefile"), "Makefile.md");
        assert_eq!(doc_path_for_source("v1.2/notes"), "v1.2/notes.md");
    }

    #[test]
    fn repo_ref_decodes_provider_shape() {
        let body = serde_json::json!({
            "id": 42,
            "name": "demo",
            "full_name": "alice/demo",
            "html_url": "https://github.com/alice/demo",
            "private": false
        });
        let repo: RepoRef = serde_json::from_value(body).unwrap();
        assert_eq!(repo.id, 42);
        assert_eq!(repo.full_name, "alice/demo");
        assert!(repo.clone_url.is_none());
    }

    #[test]
    fn change_kind_uses_provider_spelling() {
        let file: ChangedFile =
            serde_json::from_str(r#"{"path":"src/a.ts","status":"modified"}"#).unwrap();
        assert_eq!(file.status, ChangeKind::Modified);
    }
}
