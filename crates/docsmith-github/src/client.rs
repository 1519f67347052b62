//! The real GitHub REST client.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use docsmith_core::{ChangeKind, ChangedFile};

use crate::{
    ContentEntry, ProviderError, ProviderRepo, RetryPolicy, SourceProvider, WebhookRegistration,
};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "docsmith";
const API_VERSION: &str = "2022-11-28";

pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    retry: RetryPolicy,
}

impl GithubClient {
    /// Build a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Point the client at a different API base (used by tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn get(&self, token: &str, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// GET a JSON resource with the retry policy applied.
    async fn get_json<T>(
        &self,
        token: &str,
        url: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<T, ProviderError>
    where
        T: serde::de::DeserializeOwned,
    {
        let this = self;
        self.retry
            .run(context, || {
                let url = url.to_string();
                let query: Vec<(String, String)> = query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                let context = context.to_string();
                async move {
                    let resp = this.get(token, &url).query(&query).send().await?;
                    if !resp.status().is_success() {
                        return Err(ProviderError::from_status(resp.status(), &context));
                    }
                    Ok(resp.json::<T>().await?)
                }
            })
            .await
    }
}

/// GitHub reports commit files with a wider status vocabulary than pushes;
/// everything that is not an add or a removal is treated as a modification.
fn commit_status_to_change(status: &str) -> ChangeKind {
    match status {
        "added" => ChangeKind::Added,
        "removed" => ChangeKind::Removed,
        _ => ChangeKind::Modified,
    }
}

#[derive(Deserialize)]
struct RawCommitFile {
    filename: String,
    status: String,
    #[serde(default)]
    sha: Option<String>,
}

#[derive(Deserialize)]
struct RawCommit {
    #[serde(default)]
    files: Vec<RawCommitFile>,
}

#[derive(Deserialize)]
struct RawHook {
    id: i64,
}

/// A contents listing is an array for directories but a bare object for a
/// file path; accept both.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawContents {
    Listing(Vec<ContentEntry>),
    Single(Box<ContentEntry>),
}

#[async_trait]
impl SourceProvider for GithubClient {
    async fn list_user_repos(&self, token: &str) -> Result<Vec<ProviderRepo>, ProviderError> {
        let url = format!("{}/user/repos", self.api_base);
        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let page_str = page.to_string();
            let repos: Vec<ProviderRepo> = self
                .get_json(
                    token,
                    &url,
                    &[("per_page", "100"), ("page", &page_str), ("sort", "updated")],
                    "list repos",
                )
                .await?;
            let count = repos.len();
            all.extend(repos);
            if count < 100 {
                break;
            }
            page += 1;
        }
        Ok(all)
    }

    async fn list_contents(
        &self,
        token: &str,
        full_name: &str,
        path: &str,
    ) -> Result<Vec<ContentEntry>, ProviderError> {
        let url = format!("{}/repos/{}/contents/{}", self.api_base, full_name, path);
        let contents: RawContents = self
            .get_json(token, &url, &[], &format!("contents of {full_name}:{path}"))
            .await?;
        Ok(match contents {
            RawContents::Listing(entries) => entries,
            RawContents::Single(entry) => vec![*entry],
        })
    }

    async fn fetch_file(
        &self,
        token: &str,
        download_url: &str,
    ) -> Result<Option<Vec<u8>>, ProviderError> {
        let this = self;
        let result = self
            .retry
            .run("fetch_file", || {
                let url = download_url.to_string();
                async move {
                    let resp = this.get(token, &url).send().await?;
                    if !resp.status().is_success() {
                        return Err(ProviderError::from_status(resp.status(), &url));
                    }
                    Ok(resp.bytes().await?.to_vec())
                }
            })
            .await;

        // A file that cannot be fetched is recorded without content rather
        // than failing the walk; a credential failure aborts it.
        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(ProviderError::Unauthorized) => Err(ProviderError::Unauthorized),
            Err(err) => {
                warn!(url = download_url, error = %err, "file fetch failed");
                Ok(None)
            }
        }
    }

    async fn fetch_commit(
        &self,
        token: &str,
        full_name: &str,
        sha: &str,
    ) -> Result<Vec<ChangedFile>, ProviderError> {
        let url = format!("{}/repos/{}/commits/{}", self.api_base, full_name, sha);
        let commit: RawCommit = self
            .get_json(token, &url, &[], &format!("commit {sha}"))
            .await?;

        Ok(commit
            .files
            .into_iter()
            .map(|f| ChangedFile {
                status: commit_status_to_change(&f.status),
                path: f.filename,
                content_identity: f.sha,
            })
            .collect())
    }

    async fn register_webhook(
        &self,
        token: &str,
        full_name: &str,
        delivery_url: &str,
        secret: &str,
    ) -> Result<WebhookRegistration, ProviderError> {
        let url = format!("{}/repos/{}/hooks", self.api_base, full_name);
        let body = serde_json::json!({
            "name": "web",
            "active": true,
            "events": ["push"],
            "config": {
                "url": delivery_url,
                "content_type": "json",
                "secret": secret,
                "insecure_ssl": "0",
            },
        });

        let this = self;
        let hook: RawHook = self
            .retry
            .run("register_webhook", || {
                let url = url.clone();
                let body = body.clone();
                async move {
                    let resp = this
                        .http
                        .post(&url)
                        .bearer_auth(token)
                        .header("Accept", "application/vnd.github+json")
                        .header("X-GitHub-Api-Version", API_VERSION)
                        .json(&body)
                        .send()
                        .await?;
                    if !resp.status().is_success() {
                        return Err(ProviderError::from_status(resp.status(), &url));
                    }
                    Ok(resp.json().await?)
                }
            })
            .await?;

        debug!(repo = full_name, hook_id = hook.id, "registered push webhook");
        Ok(WebhookRegistration { id: hook.id })
    }
}
