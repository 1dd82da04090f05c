use crate::buffer::MessageBuffer;
use crate::domain::IncomingMessage;
use crate::queue::ListStore;
use crate::reliability::ReplayOutcome;
use crate::sender::PersistenceClient;
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// HTTP surface: ingestion for producers plus operator endpoints.
pub fn router<S: ListStore, P: PersistenceClient>(buffer: Arc<MessageBuffer<S, P>>) -> Router {
    Router::new()
        .route("/api/v1/messages", post(enqueue_message::<S, P>))
        .route("/api/v1/buffer/status", get(buffer_status::<S, P>))
        .route("/api/v1/buffer/flush", post(request_flush::<S, P>))
        .route(
            "/api/v1/buffer/dead-letters/replay",
            post(replay_dead_letter::<S, P>),
        )
        .route("/health", get(health::<S, P>))
        .route("/metrics", get(metrics::<S, P>))
        .with_state(buffer)
}

async fn enqueue_message<S: ListStore, P: PersistenceClient>(
    State(buffer): State<Arc<MessageBuffer<S, P>>>,
    Json(incoming): Json<IncomingMessage>,
) -> Response {
    if incoming.content.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "content must not be empty" })),
        )
            .into_response();
    }

    match buffer.buffer_message(incoming).await {
        Ok(id) => (StatusCode::ACCEPTED, Json(json!({ "id": id }))).into_response(),
        Err(e) => {
            error!("Failed to buffer message: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "message buffer unavailable" })),
            )
                .into_response()
        }
    }
}

async fn buffer_status<S: ListStore, P: PersistenceClient>(
    State(buffer): State<Arc<MessageBuffer<S, P>>>,
) -> Response {
    match buffer.status().await {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            error!("Failed to read buffer status: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn request_flush<S: ListStore, P: PersistenceClient>(
    State(buffer): State<Arc<MessageBuffer<S, P>>>,
) -> StatusCode {
    info!("Flush requested over HTTP");
    buffer.request_flush();
    StatusCode::ACCEPTED
}

async fn replay_dead_letter<S: ListStore, P: PersistenceClient>(
    State(buffer): State<Arc<MessageBuffer<S, P>>>,
) -> Response {
    match buffer.replay_oldest_dead_letter().await {
        Ok(ReplayOutcome::Empty) => Json(json!({ "status": "empty" })).into_response(),
        Ok(ReplayOutcome::Replayed { messages }) => {
            Json(json!({ "status": "replayed", "messages": messages })).into_response()
        }
        Ok(ReplayOutcome::Failed { messages, error }) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "status": "failed",
                "messages": messages,
                "error": error.to_string(),
            })),
        )
            .into_response(),
        Err(e) => {
            error!("Dead-letter replay failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn health<S: ListStore, P: PersistenceClient>(
    State(buffer): State<Arc<MessageBuffer<S, P>>>,
) -> (StatusCode, &'static str) {
    match buffer.ping().await {
        Ok(()) => (StatusCode::OK, "Healthy"),
        Err(e) => {
            error!("Health check failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "Queue unavailable")
        }
    }
}

async fn metrics<S: ListStore, P: PersistenceClient>(
    State(buffer): State<Arc<MessageBuffer<S, P>>>,
) -> Response {
    match buffer.metrics().render() {
        Some(Ok(text)) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Some(Err(e)) => {
            error!("Failed to encode metrics: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
