//! Repository and status endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use docsmith_core::{RepoRef, Repository, StatusRecord};
use docsmith_merkle::ARTIFACT_NAME;

use crate::{ApiError, AppState, AuthUser};

pub(crate) async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Pass-through listing of the user's provider repositories.
pub(crate) async fn user_repos(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<docsmith_github::ProviderRepo>>, ApiError> {
    let repos = state.provider.list_user_repos(&user.token).await?;
    Ok(Json(repos))
}

/// Repositories already selected by the current user.
pub(crate) async fn list_repos(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Repository>>, ApiError> {
    let repos = state.db.repositories_for_user(&user.user_id).await?;
    Ok(Json(repos))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SelectRequest {
    repo: RepoRef,
}

#[derive(Debug, Serialize)]
pub(crate) struct SelectResponse {
    #[serde(flatten)]
    repository: Repository,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Select a repository for documentation. Idempotent: a repeat selection
/// returns the existing row and starts nothing new.
pub(crate) async fn select_repo(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<SelectRequest>,
) -> Result<Json<SelectResponse>, ApiError> {
    let outcome = state
        .orchestrator
        .select_repo(&user.user_id, &user.token, request.repo)
        .await?;
    Ok(Json(SelectResponse {
        repository: outcome.repository,
        message: (!outcome.created).then(|| "Repository already exists".to_string()),
    }))
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    #[serde(flatten)]
    status: StatusRecord,
    debug: StatusDebug,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusDebug {
    #[serde(rename = "outputDir")]
    output_dir: String,
    #[serde(rename = "merkleArtifactPresent")]
    merkle_artifact_present: bool,
    #[serde(rename = "merkleRoot", skip_serializing_if = "Option::is_none")]
    merkle_root: Option<String>,
    #[serde(rename = "repoFound")]
    repo_found: bool,
}

/// Reconciled generation status. Always 200, even for unknown repositories
/// and error states, so the UI can render whatever comes back.
pub(crate) async fn repo_status(
    State(state): State<AppState>,
    Path(repo_id): Path<i64>,
) -> Result<Json<StatusResponse>, ApiError> {
    let repository = state.db.repository_by_id(repo_id).await?;

    let Some(repository) = repository else {
        return Ok(Json(StatusResponse {
            status: StatusRecord::not_started(),
            debug: StatusDebug {
                output_dir: String::new(),
                merkle_artifact_present: false,
                merkle_root: None,
                repo_found: false,
            },
        }));
    };

    let status = state.reconciler.reconciled_status(&repository.name).await;
    let output_dir = state.config.repo_output_dir(&repository.name);
    let merkle_artifact_present = output_dir.join(ARTIFACT_NAME).is_file();

    Ok(Json(StatusResponse {
        status,
        debug: StatusDebug {
            output_dir: output_dir.display().to_string(),
            merkle_artifact_present,
            merkle_root: repository.merkle_root,
            repo_found: true,
        },
    }))
}
