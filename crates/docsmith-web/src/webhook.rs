//! Signature-verified webhook receiver.
//!
//! Deliveries are authenticated with the shared HMAC secret before any
//! decoding happens. Push events are handed to the orchestrator and
//! acknowledged with 202 and a correlation id; everything else is
//! acknowledged without action. Duplicate deliveries are harmless — the
//! per-repo single-flight coalesces them.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::info;
use uuid::Uuid;

use docsmith_core::DocsmithError;
use docsmith_engine::PushOutcome;
use docsmith_github::{verify_webhook_signature, WebhookEvent};

use crate::{ApiError, AppState};

pub(crate) async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let signature = header(&headers, "x-hub-signature-256");
    let event_kind = header(&headers, "x-github-event");
    let delivery = header(&headers, "x-github-delivery");

    let (Some(signature), Some(event_kind), Some(delivery)) = (signature, event_kind, delivery)
    else {
        return Err(ApiError(DocsmithError::BadRequest(
            "missing webhook headers".to_string(),
        )));
    };

    let Some(secret) = state.config.webhook_secret.as_deref() else {
        return Err(ApiError(DocsmithError::ConfigurationMissing(
            "webhook secret is not configured".to_string(),
        )));
    };

    if !verify_webhook_signature(&body, signature, secret) {
        return Err(ApiError(DocsmithError::SignatureInvalid));
    }

    let event = WebhookEvent::parse(event_kind, &body)
        .map_err(|e| ApiError(DocsmithError::BadRequest(e.to_string())))?;

    match event {
        WebhookEvent::Other(kind) => Ok((
            StatusCode::OK,
            format!("Unhandled event type: {kind}"),
        )
            .into_response()),
        WebhookEvent::Push(push) => {
            info!(
                repo = %push.repository.full_name,
                delivery,
                git_ref = %push.git_ref,
                "push delivery received"
            );
            let correlation = correlation_id(delivery);
            let outcome = state.orchestrator.on_push(&push).await?;

            let response = match outcome {
                PushOutcome::SkippedBranch => (
                    StatusCode::OK,
                    Json(serde_json::json!({
                        "message": "Push ignored: not the default branch",
                        "correlationId": correlation,
                    })),
                ),
                PushOutcome::NoChanges => (
                    StatusCode::ACCEPTED,
                    Json(serde_json::json!({
                        "message": "Push accepted: no changed files",
                        "correlationId": correlation,
                    })),
                ),
                PushOutcome::Started | PushOutcome::Coalesced => (
                    StatusCode::ACCEPTED,
                    Json(serde_json::json!({
                        "message": "Push accepted",
                        "correlationId": correlation,
                    })),
                ),
            };
            Ok(response.into_response())
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Use the provider's delivery id when it looks sane, else mint one.
fn correlation_id(delivery: &str) -> String {
    if delivery.len() <= 64 && delivery.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        delivery.to_string()
    } else {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sane_delivery_ids_are_reused() {
        assert_eq!(correlation_id("abc-123"), "abc-123");
    }

    #[test]
    fn hostile_delivery_ids_are_replaced() {
        let minted = correlation_id("not a <sane> id\n");
        assert_ne!(minted, "not a <sane> id\n");
        assert_eq!(minted.len(), 36);
    }
}
