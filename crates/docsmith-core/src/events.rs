//! Progress events published on the bus and streamed to SSE clients.
//!
//! Events are transient: they are never persisted, only fanned out to live
//! subscribers or held briefly in the bus buffer for late ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single generated document carried in a completion event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventKind {
    Connected,
    DocumentationStored,
    DocumentationError,
    DocumentationComplete,
}

/// A progress event for one repository (or the initial `connected` handshake,
/// which carries no repository).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressEventKind,
    #[serde(rename = "repoName", skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<DocumentPayload>>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    fn base(kind: ProgressEventKind, repo_name: Option<String>) -> Self {
        Self {
            kind,
            repo_name,
            file: None,
            progress: None,
            message: None,
            documents: None,
            timestamp: Utc::now(),
        }
    }

    /// One-shot handshake sent to every new subscriber.
    pub fn connected() -> Self {
        Self::base(ProgressEventKind::Connected, None)
    }

    /// A single document was generated and stored.
    pub fn stored(
        repo_name: impl Into<String>,
        file: impl Into<String>,
        progress: u8,
        message: impl Into<String>,
    ) -> Self {
        let mut event = Self::base(ProgressEventKind::DocumentationStored, Some(repo_name.into()));
        event.file = Some(file.into());
        event.progress = Some(progress);
        event.message = Some(message.into());
        event
    }

    /// Coarse progress for a run transition that has no single file, such
    /// as the start of generation.
    pub fn progress(
        repo_name: impl Into<String>,
        progress: u8,
        message: impl Into<String>,
    ) -> Self {
        let mut event = Self::base(ProgressEventKind::DocumentationStored, Some(repo_name.into()));
        event.progress = Some(progress);
        event.message = Some(message.into());
        event
    }

    /// The current run failed.
    pub fn error(repo_name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut event = Self::base(ProgressEventKind::DocumentationError, Some(repo_name.into()));
        event.message = Some(message.into());
        event
    }

    /// Generation finished; carries everything produced during the run.
    pub fn complete(repo_name: impl Into<String>, documents: Vec<DocumentPayload>) -> Self {
        let mut event = Self::base(
            ProgressEventKind::DocumentationComplete,
            Some(repo_name.into()),
        );
        event.progress = Some(100);
        event.message = Some("Documentation is ready!".to_string());
        event.documents = Some(documents);
        event
    }

    /// Buffer key: events are deduplicated/evicted by kind, repository and
    /// publication instant.
    pub fn buffer_key(&self) -> (ProgressEventKind, Option<&str>, i64) {
        (
            self.kind,
            self.repo_name.as_deref(),
            self.timestamp.timestamp_millis(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_kind_as_type_field() {
        let event = ProgressEvent::stored("demo", "src/main.md", 45, "stored src/main.md");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "documentation_stored");
        assert_eq!(json["repoName"], "demo");
        assert_eq!(json["file"], "src/main.md");
        assert_eq!(json["progress"], 45);
    }

    #[test]
    fn connected_event_omits_absent_fields() {
        let json = serde_json::to_value(ProgressEvent::connected()).unwrap();
        assert_eq!(json["type"], "connected");
        assert!(json.get("repoName").is_none());
        assert!(json.get("progress").is_none());
        assert!(json.get("documents").is_none());
    }

    #[test]
    fn complete_event_carries_documents() {
        let docs = vec![DocumentPayload {
            path: "index.md".to_string(),
            content: "# Index".to_string(),
        }];
        let event = ProgressEvent::complete("demo", docs);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "documentation_complete");
        assert_eq!(json["progress"], 100);
        assert_eq!(json["documents"][0]["path"], "index.md");
    }
}
