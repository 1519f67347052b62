//! Webhook event decoding.
//!
//! Deliveries are decoded into tagged variants right at the boundary; only
//! the `push` shape is modeled, everything else is carried as `Other` so the
//! receiver can acknowledge it without pretending to understand it.

use std::collections::BTreeMap;

use serde::Deserialize;

use docsmith_core::{ChangeKind, ChangedFile};

use crate::ProviderError;

/// A decoded webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Push(PushEvent),
    Other(String),
}

impl WebhookEvent {
    /// Decode a delivery from its event-kind header and raw body.
    pub fn parse(kind: &str, body: &[u8]) -> Result<Self, ProviderError> {
        if kind != "push" {
            return Ok(WebhookEvent::Other(kind.to_string()));
        }
        let push: PushEvent = serde_json::from_slice(body)
            .map_err(|e| ProviderError::Malformed(format!("push payload: {e}")))?;
        Ok(WebhookEvent::Push(push))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushRepository {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushCommit {
    pub id: String,
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
}

/// The parts of a `push` delivery the orchestrator consumes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub repository: PushRepository,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
    #[serde(default)]
    pub after: Option<String>,
}

impl PushEvent {
    /// The branch the push landed on, when the ref is a branch ref.
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix("refs/heads/")
    }

    /// Pushes are only acted on for the default branch. The provider's
    /// `default_branch` wins when present; otherwise both `main` and
    /// `master` are accepted.
    pub fn is_default_branch(&self) -> bool {
        let Some(branch) = self.branch() else {
            return false;
        };
        match self.repository.default_branch.as_deref() {
            Some(default) => branch == default,
            None => branch == "main" || branch == "master",
        }
    }

    /// Collapse the commit list into one change per path, in commit order:
    /// the final state wins, except that a file added within this push stays
    /// `added` through later modifications.
    pub fn changed_files(&self) -> Vec<ChangedFile> {
        let mut states: BTreeMap<&str, ChangeKind> = BTreeMap::new();
        for commit in &self.commits {
            for path in &commit.added {
                states.insert(path.as_str(), ChangeKind::Added);
            }
            for path in &commit.modified {
                match states.get(path.as_str()) {
                    Some(ChangeKind::Added) => {}
                    _ => {
                        states.insert(path.as_str(), ChangeKind::Modified);
                    }
                }
            }
            for path in &commit.removed {
                states.insert(path.as_str(), ChangeKind::Removed);
            }
        }
        states
            .into_iter()
            .map(|(path, status)| ChangedFile {
                path: path.to_string(),
                status,
                content_identity: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_body(git_ref: &str, default_branch: Option<&str>) -> String {
        let default = default_branch
            .map(|b| format!(r#","default_branch":"{b}""#))
            .unwrap_or_default();
        format!(
            r#"{{
                "ref": "{git_ref}",
                "after": "abc123",
                "repository": {{"id": 42, "name": "demo", "full_name": "alice/demo"{default}}},
                "commits": [
                    {{"id": "c1", "added": ["src/new.ts"], "modified": ["src/a.ts"], "removed": []}},
                    {{"id": "c2", "added": [], "modified": ["src/new.ts"], "removed": ["src/b.ts"]}}
                ]
            }}"#
        )
    }

    #[test]
    fn parses_push_deliveries() {
        let body = push_body("refs/heads/main", Some("main"));
        let event = WebhookEvent::parse("push", body.as_bytes()).unwrap();
        let WebhookEvent::Push(push) = event else {
            panic!("expected a push event");
        };
        assert_eq!(push.repository.id, 42);
        assert_eq!(push.branch(), Some("main"));
        assert!(push.is_default_branch());
    }

    #[test]
    fn non_push_kinds_become_other() {
        let event = WebhookEvent::parse("issues", b"{}").unwrap();
        assert_eq!(event, WebhookEvent::Other("issues".to_string()));
    }

    #[test]
    fn malformed_push_bodies_are_rejected() {
        assert!(WebhookEvent::parse("push", b"not json").is_err());
        assert!(WebhookEvent::parse("push", b"{}").is_err());
    }

    #[test]
    fn branch_gating_follows_provider_default_then_fallback() {
        let on_feature = push_body("refs/heads/feature", Some("main"));
        let WebhookEvent::Push(push) = WebhookEvent::parse("push", on_feature.as_bytes()).unwrap()
        else {
            unreachable!()
        };
        assert!(!push.is_default_branch());

        // Provider default wins even when it is not main/master.
        let on_trunk = push_body("refs/heads/trunk", Some("trunk"));
        let WebhookEvent::Push(push) = WebhookEvent::parse("push", on_trunk.as_bytes()).unwrap()
        else {
            unreachable!()
        };
        assert!(push.is_default_branch());

        // Without provider metadata, both main and master are accepted.
        for branch in ["refs/heads/main", "refs/heads/master"] {
            let body = push_body(branch, None);
            let WebhookEvent::Push(push) = WebhookEvent::parse("push", body.as_bytes()).unwrap()
            else {
                unreachable!()
            };
            assert!(push.is_default_branch());
        }

        // Tag pushes are never the default branch.
        let tag = push_body("refs/tags/v1.0", Some("main"));
        let WebhookEvent::Push(push) = WebhookEvent::parse("push", tag.as_bytes()).unwrap() else {
            unreachable!()
        };
        assert!(!push.is_default_branch());
    }

    #[test]
    fn changed_files_collapse_to_final_state_per_path() {
        let body = push_body("refs/heads/main", Some("main"));
        let WebhookEvent::Push(push) = WebhookEvent::parse("push", body.as_bytes()).unwrap()
        else {
            unreachable!()
        };
        let changes = push.changed_files();
        let as_pairs: Vec<_> = changes
            .iter()
            .map(|c| (c.path.as_str(), c.status))
            .collect();
        assert_eq!(
            as_pairs,
            vec![
                ("src/a.ts", ChangeKind::Modified),
                ("src/b.ts", ChangeKind::Removed),
                // Added then modified within the same push stays added.
                ("src/new.ts", ChangeKind::Added),
            ]
        );
    }
}
