//! The documentation lifecycle state machine.
//!
//! A repository moves `not_started → generating → complete`, falling to
//! `error` when a run fails and re-entering `generating` on a push. One
//! orchestrator instance owns all repository runs; a per-repo single-flight
//! guard keeps them from overlapping, and a supervisor wraps every
//! background run so a failure always lands in exactly one status update
//! and one `documentation_error` event.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use docsmith_core::{
    doc_path_for_source, status::READY_MESSAGE, ChangeKind, ChangedFile, Config, DocStatus,
    DocsmithError, DocumentPayload, ExclusionFilter, ProgressEvent, RepoRef, Repository,
    MAX_FILE_SIZE,
};
use docsmith_github::{PushEvent, SourceProvider};
use docsmith_merkle::{compute_over_directory, MerkleCommitment};
use docsmith_store::Database;

use crate::analyzer::{collect_markdown_files, AnalyzerRequest, AnalyzerRunner};
use crate::bus::ProgressBus;
use crate::flight::{FlightOutcome, SingleFlight};
use crate::ingest::Ingestor;

/// Result of a repository selection.
#[derive(Debug, Clone)]
pub struct SelectOutcome {
    pub repository: Repository,
    /// Whether this call inserted the row (and therefore started
    /// generation and webhook registration).
    pub created: bool,
}

/// Result of handing a push to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// A new incremental run was started.
    Started,
    /// A run was in flight; the change set was coalesced into its follow-up.
    Coalesced,
    /// The push was not for the default branch and was ignored.
    SkippedBranch,
    /// The push carried no changed files.
    NoChanges,
}

pub struct Orchestrator {
    config: Config,
    db: Database,
    provider: Arc<dyn SourceProvider>,
    bus: Arc<ProgressBus>,
    filter: ExclusionFilter,
    ingestor: Ingestor,
    runner: AnalyzerRunner,
    flights: SingleFlight,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        db: Database,
        provider: Arc<dyn SourceProvider>,
        bus: Arc<ProgressBus>,
    ) -> Arc<Self> {
        let filter = ExclusionFilter::default_set();
        let ingestor = Ingestor::new(
            db.clone(),
            Arc::clone(&provider),
            filter.clone(),
            config.source_root.clone(),
        );
        let runner = AnalyzerRunner::new(
            config.analyzer_command.clone(),
            config.analyzer_args.clone(),
            config.analyzer_timeout,
        );
        Arc::new(Self {
            config,
            db,
            provider,
            bus,
            filter,
            ingestor,
            runner,
            flights: SingleFlight::new(),
        })
    }

    pub fn bus(&self) -> &Arc<ProgressBus> {
        &self.bus
    }

    /// Handle a repository selection.
    ///
    /// Idempotent by (user, provider repo id): a repeat selection returns
    /// the existing row and triggers nothing. The first selection persists
    /// the row, then starts webhook registration and full generation in the
    /// background and returns immediately.
    pub async fn select_repo(
        self: &Arc<Self>,
        user_id: &str,
        token: &str,
        repo_ref: RepoRef,
    ) -> Result<SelectOutcome, DocsmithError> {
        let (repository, created) = self.db.insert_repository(user_id, &repo_ref).await?;
        if !created {
            return Ok(SelectOutcome {
                repository,
                created: false,
            });
        }

        info!(repo = %repository.full_name, "repository selected; starting generation");

        {
            let this = Arc::clone(self);
            let token = token.to_string();
            let repository = repository.clone();
            tokio::spawn(async move {
                this.register_webhook(&token, &repository).await;
            });
        }

        if self.flights.begin(&repository.name) == FlightOutcome::Started {
            let this = Arc::clone(self);
            let token = token.to_string();
            let repository = repository.clone();
            tokio::spawn(async move {
                this.run_supervised(repository, token, None).await;
            });
        }

        Ok(SelectOutcome {
            repository,
            created: true,
        })
    }

    /// Handle a decoded push delivery.
    pub async fn on_push(self: &Arc<Self>, push: &PushEvent) -> Result<PushOutcome, DocsmithError> {
        if !push.is_default_branch() {
            info!(
                repo = %push.repository.full_name,
                git_ref = %push.git_ref,
                "ignoring push to non-default branch"
            );
            return Ok(PushOutcome::SkippedBranch);
        }

        let Some(repository) = self
            .db
            .repository_by_provider_id(push.repository.id)
            .await?
        else {
            return Err(DocsmithError::NotFound(format!(
                "repository {} is not registered",
                push.repository.full_name
            )));
        };

        let changes = push.changed_files();
        if changes.is_empty() {
            return Ok(PushOutcome::NoChanges);
        }

        match self.flights.begin_or_queue(&repository.name, changes.clone()) {
            FlightOutcome::Coalesced => Ok(PushOutcome::Coalesced),
            FlightOutcome::Started => {
                let this = Arc::clone(self);
                let token = self.config.github_token.clone().unwrap_or_default();
                tokio::spawn(async move {
                    this.run_supervised(repository, token, Some(changes)).await;
                });
                Ok(PushOutcome::Started)
            }
        }
    }

    /// Best-effort webhook registration. Failure is recorded on the row and
    /// never blocks generation.
    async fn register_webhook(&self, token: &str, repo: &Repository) {
        let (Some(secret), Some(url)) = (
            self.config.webhook_secret.as_deref(),
            self.config.webhook_delivery_url(),
        ) else {
            warn!(repo = %repo.full_name, "webhook not registered: secret or public URL missing");
            if let Err(err) = self
                .db
                .set_webhook_error(repo.id, "webhook secret or public URL not configured")
                .await
            {
                warn!(repo = %repo.full_name, error = %err, "failed to record webhook error");
            }
            return;
        };

        match self
            .provider
            .register_webhook(token, &repo.full_name, &url, secret)
            .await
        {
            Ok(registration) => {
                if let Err(err) = self.db.set_webhook_id(repo.id, registration.id).await {
                    warn!(repo = %repo.full_name, error = %err, "failed to record webhook id");
                }
            }
            Err(err) => {
                warn!(repo = %repo.full_name, error = %err, "webhook registration failed");
                if let Err(db_err) = self.db.set_webhook_error(repo.id, &err.to_string()).await {
                    warn!(repo = %repo.full_name, error = %db_err, "failed to record webhook error");
                }
            }
        }
    }

    /// Drive runs for one repository until no follow-up is pending. Each
    /// run executes inside its own task so that even a panic is funneled
    /// into the single error path: log, `error` status, error event.
    async fn run_supervised(
        self: Arc<Self>,
        repo: Repository,
        token: String,
        mut changes: Option<Vec<ChangedFile>>,
    ) {
        loop {
            let this = Arc::clone(&self);
            let run_repo = repo.clone();
            let run_token = token.clone();
            let run_changes = changes.take();
            let joined = tokio::spawn(async move {
                match run_changes {
                    None => this.ingest_and_generate(&run_token, &run_repo).await,
                    Some(set) => this.incremental_update(&run_token, &run_repo, set).await,
                }
            })
            .await;

            let result = match joined {
                Ok(result) => result,
                Err(join_err) => Err(DocsmithError::Internal(format!(
                    "documentation task aborted: {join_err}"
                ))),
            };

            if let Err(err) = result {
                error!(repo = %repo.name, kind = err.kind(), error = %err, "documentation run failed");
                let progress = self.db.status_for(&repo.name).await.progress;
                self.db
                    .set_status(&repo.name, DocStatus::Error, progress as i64, &err.to_string())
                    .await;
                self.bus
                    .publish(ProgressEvent::error(&repo.name, err.to_string()));
            }

            match self.flights.finish(&repo.name) {
                Some(pending) => changes = Some(pending),
                None => break,
            }
        }
    }

    /// Full pipeline: ingest everything, run the analyzer, commit output.
    async fn ingest_and_generate(
        &self,
        token: &str,
        repo: &Repository,
    ) -> Result<(), DocsmithError> {
        self.transition(repo, 10, "Starting documentation generation").await;

        let ingested = self.ingestor.full_walk(token, repo).await?;
        self.db
            .set_status(
                &repo.name,
                DocStatus::Generating,
                20,
                &format!("Ingested {ingested} files"),
            )
            .await;

        if ingested == 0 {
            return self.complete_empty(repo).await;
        }

        self.generate_and_commit(repo).await
    }

    /// Incremental pipeline for a push's change set.
    async fn incremental_update(
        &self,
        token: &str,
        repo: &Repository,
        changes: Vec<ChangedFile>,
    ) -> Result<(), DocsmithError> {
        self.transition(repo, 10, "Updating documentation for pushed changes").await;

        self.ingestor.delta_walk(token, repo, &changes).await?;

        // Stale output for removed sources must not survive into the new
        // commitment.
        let output_dir = self.config.repo_output_dir(&repo.name);
        for change in &changes {
            if change.status == ChangeKind::Removed {
                if let Some(stale) =
                    safe_join(&output_dir, &doc_path_for_source(&change.path))
                {
                    match tokio::fs::remove_file(&stale).await {
                        Ok(()) => {}
                        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                        Err(err) => {
                            warn!(path = %stale.display(), error = %err, "failed to remove stale output")
                        }
                    }
                }
            }
        }

        self.db
            .set_status(&repo.name, DocStatus::Generating, 20, "Changed files ingested")
            .await;

        if self.db.repo_file_count(repo.id).await? == 0 {
            return self.complete_empty(repo).await;
        }

        self.generate_and_commit(repo).await
    }

    /// The shared tail of both pipelines: analyzer run, document upserts
    /// with progress events, Merkle commitment, completion.
    async fn generate_and_commit(&self, repo: &Repository) -> Result<(), DocsmithError> {
        let output_dir = self.config.repo_output_dir(&repo.name);
        let request = AnalyzerRequest {
            repo_dir: self.ingestor.source_dir(&repo.name),
            output_dir: output_dir.clone(),
            include_globs: Vec::new(),
            // The source tree was already filtered during ingestion.
            exclude_globs: Vec::new(),
            max_file_size: MAX_FILE_SIZE,
            flags: Vec::new(),
        };
        self.runner.run(&request).await?;

        let documents = self.store_documents(repo, &output_dir).await?;
        self.commit_output(repo, &output_dir).await?;

        self.db
            .set_status(&repo.name, DocStatus::Complete, 100, READY_MESSAGE)
            .await;
        self.bus
            .publish(ProgressEvent::complete(&repo.name, documents));
        info!(repo = %repo.name, "documentation generation complete");
        Ok(())
    }

    /// Upsert every generated markdown file, publishing per-file progress.
    /// A storage failure here aborts the run.
    async fn store_documents(
        &self,
        repo: &Repository,
        output_dir: &Path,
    ) -> Result<Vec<DocumentPayload>, DocsmithError> {
        let files = collect_markdown_files(output_dir);
        let total = files.len();
        let mut documents = Vec::with_capacity(total);

        for (processed, (rel, abs)) in files.into_iter().enumerate() {
            let content = tokio::fs::read_to_string(&abs).await.map_err(|e| {
                DocsmithError::Internal(format!("cannot read analyzer output {rel}: {e}"))
            })?;
            self.db.upsert_document(&repo.name, &rel, &content).await?;

            let progress = scaled_progress(processed + 1, total);
            self.bus.publish(ProgressEvent::stored(
                &repo.name,
                &rel,
                progress,
                format!("Generated documentation for {rel}"),
            ));
            self.db
                .set_status(
                    &repo.name,
                    DocStatus::Generating,
                    progress as i64,
                    &format!("Generated documentation for {rel}"),
                )
                .await;

            documents.push(DocumentPayload {
                path: rel,
                content,
            });
        }
        Ok(documents)
    }

    /// Recompute the Merkle commitment over the output tree and persist it.
    async fn commit_output(&self, repo: &Repository, output_dir: &Path) -> Result<(), DocsmithError> {
        let commitment = compute_over_directory(output_dir, &self.filter)
            .map_err(|e| DocsmithError::Internal(format!("merkle computation failed: {e}")))?;
        commitment
            .write_artifact(output_dir)
            .map_err(|e| DocsmithError::Internal(format!("cannot write merkle artifact: {e}")))?;
        self.db.set_merkle_root(repo.id, &commitment.root).await?;
        Ok(())
    }

    /// Completion for a repository with nothing to document: no documents,
    /// empty Merkle root, still `complete/100`.
    async fn complete_empty(&self, repo: &Repository) -> Result<(), DocsmithError> {
        let output_dir = self.config.repo_output_dir(&repo.name);
        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
            DocsmithError::Internal(format!("cannot create output directory: {e}"))
        })?;
        let commitment = MerkleCommitment::empty();
        commitment
            .write_artifact(&output_dir)
            .map_err(|e| DocsmithError::Internal(format!("cannot write merkle artifact: {e}")))?;
        self.db.set_merkle_root(repo.id, "").await?;

        self.db
            .set_status(&repo.name, DocStatus::Complete, 100, READY_MESSAGE)
            .await;
        self.bus.publish(ProgressEvent::complete(&repo.name, Vec::new()));
        info!(repo = %repo.name, "repository empty; documentation complete with no documents");
        Ok(())
    }

    async fn transition(&self, repo: &Repository, progress: u8, message: &str) {
        self.db
            .set_status(&repo.name, DocStatus::Generating, progress as i64, message)
            .await;
        self.bus
            .publish(ProgressEvent::progress(&repo.name, progress, message));
    }
}

/// Per-file progress scaled into `[20, 99]`; only the final completion
/// transition reaches 100.
fn scaled_progress(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 99;
    }
    let scaled = 20.0 + (processed as f64 / total as f64) * 79.0;
    (scaled.round() as u8).min(99)
}

/// Join a derived relative path under `base`, rejecting traversal.
fn safe_join(base: &Path, rel: &str) -> Option<PathBuf> {
    let rel = Path::new(rel);
    if rel.as_os_str().is_empty()
        || !rel.components().all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(base.join(rel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_scales_into_the_working_band() {
        assert_eq!(scaled_progress(1, 3), 46);
        assert_eq!(scaled_progress(2, 3), 73);
        assert_eq!(scaled_progress(3, 3), 99);
        assert_eq!(scaled_progress(1, 1), 99);
        assert_eq!(scaled_progress(1, 100), 21);
        assert_eq!(scaled_progress(0, 0), 99);
    }

    #[test]
    fn safe_join_rejects_traversal() {
        let base = Path::new("/out/demo");
        assert_eq!(
            safe_join(base, "src/a.md"),
            Some(PathBuf::from("/out/demo/src/a.md"))
        );
        assert!(safe_join(base, "../elsewhere.md").is_none());
        assert!(safe_join(base, "").is_none());
    }
}
