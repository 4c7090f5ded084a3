use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::json;

use super::domain::SubmissionEvent;
use super::notification::Mailer;
use super::service::SubmissionOrchestrator;
use super::storage::StorageGateway;

/// Router builder exposing the submission intake endpoint.
pub fn submission_router<S, M>(orchestrator: Arc<SubmissionOrchestrator<S, M>>) -> Router
where
    S: StorageGateway + ?Sized + 'static,
    M: Mailer + ?Sized + 'static,
{
    Router::new()
        .route("/api/v1/submissions", post(submit_handler::<S, M>))
        .with_state(orchestrator)
}

pub(crate) async fn submit_handler<S, M>(
    State(orchestrator): State<Arc<SubmissionOrchestrator<S, M>>>,
    axum::Json(event): axum::Json<SubmissionEvent>,
) -> Response
where
    S: StorageGateway + ?Sized + 'static,
    M: Mailer + ?Sized + 'static,
{
    // storage and mail adapters block, so the run gets its own thread
    let joined = tokio::task::spawn_blocking(move || orchestrator.process(&event)).await;

    match joined {
        Ok(outcome) if outcome.is_fatal() => {
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(outcome)).into_response()
        }
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => {
            let payload = json!({
                "error": format!("submission worker failed: {err}"),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
