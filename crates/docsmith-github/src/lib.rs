//! GitHub provider adapter.
//!
//! Everything the pipeline needs from the source-control provider lives
//! behind the [`SourceProvider`] trait: listing repositories, reading
//! contents, fetching commit diffs and registering push webhooks.
//! [`GithubClient`] is the real implementation; tests inject fakes.
//!
//! Provider payloads are decoded into typed structs here and nowhere else —
//! loose JSON does not travel past this crate.

use async_trait::async_trait;

mod client;
mod error;
mod events;
mod retry;
mod signature;
mod types;

pub use client::GithubClient;
pub use error::ProviderError;
pub use events::{PushEvent, WebhookEvent};
pub use retry::RetryPolicy;
pub use signature::{sign_payload, verify_webhook_signature};
pub use types::{ContentEntry, EntryType, ProviderRepo, WebhookRegistration};

use docsmith_core::ChangedFile;

/// Operations the pipeline consumes from the source-control provider.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Repositories accessible to the token's user.
    async fn list_user_repos(&self, token: &str) -> Result<Vec<ProviderRepo>, ProviderError>;

    /// Entries directly under `path` ("" for the repository root).
    async fn list_contents(
        &self,
        token: &str,
        full_name: &str,
        path: &str,
    ) -> Result<Vec<ContentEntry>, ProviderError>;

    /// Raw file bytes; `None` when the provider answers 4xx/5xx for the URL.
    async fn fetch_file(
        &self,
        token: &str,
        download_url: &str,
    ) -> Result<Option<Vec<u8>>, ProviderError>;

    /// The files touched by one commit.
    async fn fetch_commit(
        &self,
        token: &str,
        full_name: &str,
        sha: &str,
    ) -> Result<Vec<ChangedFile>, ProviderError>;

    /// Create a push webhook pointing at `delivery_url`.
    async fn register_webhook(
        &self,
        token: &str,
        full_name: &str,
        delivery_url: &str,
        secret: &str,
    ) -> Result<WebhookRegistration, ProviderError>;
}
