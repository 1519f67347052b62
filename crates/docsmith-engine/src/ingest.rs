//! Repository ingestion.
//!
//! The ingestor walks a repository through the provider's contents API (or
//! a push's changed-file set), applies the exclusion filter, persists
//! `repo_files` rows and materializes the fetched tree on disk for the
//! analyzer. Ingestion is preparatory work and publishes no progress
//! events.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use docsmith_core::{
    doc_path_for_source, ChangeKind, ChangedFile, DocsmithError, ExclusionFilter, RepoFileRecord,
    Repository, MAX_FILE_SIZE,
};
use docsmith_github::{EntryType, ProviderError, SourceProvider};
use docsmith_store::Database;

pub struct Ingestor {
    db: Database,
    provider: Arc<dyn SourceProvider>,
    filter: ExclusionFilter,
    source_root: PathBuf,
}

impl Ingestor {
    pub fn new(
        db: Database,
        provider: Arc<dyn SourceProvider>,
        filter: ExclusionFilter,
        source_root: PathBuf,
    ) -> Self {
        Self {
            db,
            provider,
            filter,
            source_root,
        }
    }

    /// Walk the whole repository and materialize every eligible file.
    /// Returns the number of files ingested.
    ///
    /// A single file failing to fetch is recorded without content and the
    /// walk continues; only a credential failure aborts.
    pub async fn full_walk(
        &self,
        token: &str,
        repo: &Repository,
    ) -> Result<u64, DocsmithError> {
        let mut ingested = 0u64;
        let mut directories = vec![String::new()];

        while let Some(dir) = directories.pop() {
            let entries = match self.provider.list_contents(token, &repo.full_name, &dir).await {
                Ok(entries) => entries,
                Err(ProviderError::Unauthorized) => return Err(DocsmithError::Unauthorized),
                Err(err) => {
                    warn!(repo = %repo.full_name, path = %dir, error = %err, "skipping unlistable directory");
                    continue;
                }
            };

            for entry in entries {
                if self.filter.is_excluded(&entry.path) {
                    continue;
                }
                match entry.entry_type {
                    EntryType::Dir => directories.push(entry.path),
                    EntryType::File => {
                        if entry.size > MAX_FILE_SIZE {
                            info!(
                                repo = %repo.full_name,
                                path = %entry.path,
                                size = entry.size,
                                "skipping file over the size limit"
                            );
                            continue;
                        }
                        self.ingest_file(
                            token,
                            repo,
                            &entry.path,
                            &entry.name,
                            entry.size,
                            entry.content_identity.as_deref(),
                            entry.download_url.as_deref(),
                        )
                        .await?;
                        ingested += 1;
                    }
                    EntryType::Other => {
                        debug!(repo = %repo.full_name, path = %entry.path, "skipping non-file entry");
                    }
                }
            }
        }

        Ok(ingested)
    }

    /// Apply a push's change set: fetch and upsert added/modified files,
    /// drop removed ones together with their derived documents.
    pub async fn delta_walk(
        &self,
        token: &str,
        repo: &Repository,
        changes: &[ChangedFile],
    ) -> Result<(), DocsmithError> {
        for change in changes {
            if self.filter.is_excluded(&change.path) {
                continue;
            }
            match change.status {
                ChangeKind::Removed => {
                    self.db.delete_repo_file(repo.id, &change.path).await?;
                    self.db
                        .delete_document(&repo.name, &doc_path_for_source(&change.path))
                        .await?;
                    self.remove_materialized(repo, &change.path).await;
                }
                ChangeKind::Added | ChangeKind::Modified => {
                    let entries = match self
                        .provider
                        .list_contents(token, &repo.full_name, &change.path)
                        .await
                    {
                        Ok(entries) => entries,
                        Err(ProviderError::Unauthorized) => {
                            return Err(DocsmithError::Unauthorized)
                        }
                        Err(err) => {
                            warn!(
                                repo = %repo.full_name,
                                path = %change.path,
                                error = %err,
                                "skipping unfetchable changed file"
                            );
                            continue;
                        }
                    };
                    let Some(entry) =
                        entries.into_iter().find(|e| e.entry_type == EntryType::File)
                    else {
                        continue;
                    };
                    if entry.size > MAX_FILE_SIZE {
                        info!(
                            repo = %repo.full_name,
                            path = %entry.path,
                            size = entry.size,
                            "skipping changed file over the size limit"
                        );
                        continue;
                    }
                    self.ingest_file(
                        token,
                        repo,
                        &entry.path,
                        &entry.name,
                        entry.size,
                        entry.content_identity.as_deref(),
                        entry.download_url.as_deref(),
                    )
                    .await?;
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn ingest_file(
        &self,
        token: &str,
        repo: &Repository,
        path: &str,
        name: &str,
        size: u64,
        content_identity: Option<&str>,
        download_url: Option<&str>,
    ) -> Result<(), DocsmithError> {
        let bytes = match download_url {
            Some(url) => self
                .provider
                .fetch_file(token, url)
                .await
                .map_err(DocsmithError::from)?,
            None => None,
        };

        if let Some(bytes) = &bytes {
            self.materialize(repo, path, bytes).await;
        }

        let content = bytes.and_then(|b| String::from_utf8(b).ok());
        if content.is_none() {
            debug!(repo = %repo.full_name, path, "ingesting file without content");
        }

        let record = RepoFileRecord {
            repo_id: repo.id,
            path: path.to_string(),
            name: name.to_string(),
            size,
            content_identity: content_identity.map(str::to_string),
            content,
            updated_at: chrono::Utc::now(),
        };
        self.db.upsert_repo_file(&record).await?;
        Ok(())
    }

    /// Write the fetched bytes into the per-repo source tree the analyzer
    /// reads. Failures here are logged, not fatal: the row is the durable
    /// record.
    async fn materialize(&self, repo: &Repository, path: &str, bytes: &[u8]) {
        let Some(target) = self.safe_source_path(repo, path) else {
            warn!(repo = %repo.full_name, path, "refusing to materialize unsafe path");
            return;
        };
        if let Some(parent) = target.parent() {
            if let Err(err) = tokio::fs::create_dir_all(parent).await {
                warn!(path = %parent.display(), error = %err, "failed to create source directory");
                return;
            }
        }
        if let Err(err) = tokio::fs::write(&target, bytes).await {
            warn!(path = %target.display(), error = %err, "failed to materialize source file");
        }
    }

    async fn remove_materialized(&self, repo: &Repository, path: &str) {
        let Some(target) = self.safe_source_path(repo, path) else {
            return;
        };
        if let Err(err) = tokio::fs::remove_file(&target).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %target.display(), error = %err, "failed to remove source file");
            }
        }
    }

    /// Join a provider-supplied relative path under the repo's source dir,
    /// rejecting anything that could escape it.
    fn safe_source_path(&self, repo: &Repository, path: &str) -> Option<PathBuf> {
        let rel = Path::new(path);
        let safe = rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe || rel.as_os_str().is_empty() {
            return None;
        }
        Some(self.source_root.join(&repo.name).join(rel))
    }

    /// The on-disk tree for one repository.
    pub fn source_dir(&self, repo_name: &str) -> PathBuf {
        self.source_root.join(repo_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn repo() -> Repository {
        Repository {
            id: 1,
            user_id: "u".to_string(),
            name: "demo".to_string(),
            provider_repo_id: 42,
            full_name: "alice/demo".to_string(),
            html_url: None,
            webhook_id: None,
            webhook_error: None,
            merkle_root: None,
            created_at: Utc::now(),
        }
    }

    fn ingestor(root: &Path) -> Ingestor {
        struct NoProvider;
        #[async_trait::async_trait]
        impl SourceProvider for NoProvider {
            async fn list_user_repos(
                &self,
                _: &str,
            ) -> Result<Vec<docsmith_github::ProviderRepo>, ProviderError> {
                unimplemented!()
            }
            async fn list_contents(
                &self,
                _: &str,
                _: &str,
                _: &str,
            ) -> Result<Vec<docsmith_github::ContentEntry>, ProviderError> {
                unimplemented!()
            }
            async fn fetch_file(&self, _: &str, _: &str) -> Result<Option<Vec<u8>>, ProviderError> {
                unimplemented!()
            }
            async fn fetch_commit(
                &self,
                _: &str,
                _: &str,
                _: &str,
            ) -> Result<Vec<ChangedFile>, ProviderError> {
                unimplemented!()
            }
            async fn register_webhook(
                &self,
                _: &str,
                _: &str,
                _: &str,
                _: &str,
            ) -> Result<docsmith_github::WebhookRegistration, ProviderError> {
                unimplemented!()
            }
        }

        Ingestor::new(
            Database::unconfigured(),
            Arc::new(NoProvider),
            ExclusionFilter::default_set(),
            root.to_path_buf(),
        )
    }

    #[test]
    fn traversal_paths_are_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let ing = ingestor(dir.path());
        let repo = repo();

        assert!(ing.safe_source_path(&repo, "src/main.rs").is_some());
        assert!(ing.safe_source_path(&repo, "../escape.rs").is_none());
        assert!(ing.safe_source_path(&repo, "src/../../escape.rs").is_none());
        assert!(ing.safe_source_path(&repo, "/etc/passwd").is_none());
        assert!(ing.safe_source_path(&repo, "").is_none());
    }

    #[tokio::test]
    async fn materialize_writes_under_the_repo_source_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let ing = ingestor(dir.path());
        let repo = repo();

        ing.materialize(&repo, "src/lib.rs", b"pub fn demo() {}").await;
        let written = dir.path().join("demo/src/lib.rs");
        assert_eq!(
            tokio::fs::read_to_string(&written).await.unwrap(),
            "pub fn demo() {}"
        );

        ing.remove_materialized(&repo, "src/lib.rs").await;
        assert!(!written.exists());
        // Removing an already-absent file is quiet.
        ing.remove_materialized(&repo, "src/lib.rs").await;
    }
}
