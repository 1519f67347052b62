//! Typed shapes for provider payloads.

use serde::{Deserialize, Serialize};

/// A repository as listed by the provider for the authenticated user.
/// Passed through to the UI mostly as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRepo {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    File,
    Dir,
    /// Submodules, symlinks and anything else the walk does not descend into.
    #[serde(other)]
    Other,
}

/// One entry of a contents listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(default)]
    pub size: u64,
    /// Provider-supplied content identity (the blob sha).
    #[serde(rename = "sha", default)]
    pub content_identity: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Result of a webhook creation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRegistration {
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_entry_decodes_provider_listing() {
        let json = r#"{
            "name": "main.rs",
            "path": "src/main.rs",
            "type": "file",
            "size": 420,
            "sha": "abc123",
            "download_url": "https://raw.example.com/src/main.rs"
        }"#;
        let entry: ContentEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.entry_type, EntryType::File);
        assert_eq!(entry.content_identity.as_deref(), Some("abc123"));
    }

    #[test]
    fn unknown_entry_types_fold_to_other() {
        let json = r#"{"name": "lib", "path": "lib", "type": "submodule"}"#;
        let entry: ContentEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.entry_type, EntryType::Other);
        assert_eq!(entry.size, 0);
        assert!(entry.download_url.is_none());
    }
}
