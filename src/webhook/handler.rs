use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};

use crate::server::AppState;
use crate::webhook::events::{Routing, WebhookPayload};
use crate::webhook::signature::verify_signature;

type Reply = (StatusCode, Json<Value>);

fn reject(status: StatusCode, detail: &str) -> Reply {
    (status, Json(json!({ "detail": detail })))
}

/// `POST /webhook`: verify, route, and dispatch without waiting for the work.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok());

    if let Err(e) = verify_signature(state.config.webhook_secret(), &body, signature) {
        tracing::warn!(error = %e, "Webhook signature verification failed");
        return reject(StatusCode::UNAUTHORIZED, "Invalid webhook signature");
    }

    let payload = match WebhookPayload::parse(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid webhook JSON");
            return reject(StatusCode::BAD_REQUEST, "Invalid JSON payload");
        }
    };

    let header_event = headers.get("x-github-event").and_then(|v| v.to_str().ok());
    let Some(event) = payload.infer_event(header_event) else {
        tracing::warn!("Could not determine webhook event type");
        return reject(StatusCode::BAD_REQUEST, "Missing X-GitHub-Event header");
    };
    let action = payload.action();

    let status = match payload.route(&event, &action, state.config.reviewer.enabled) {
        Ok(Routing::Dispatch(task)) => {
            tracing::info!(event = %event, action = %action, task = %task.description(), "Accepted webhook");
            state.dispatcher.dispatch(task);
            "accepted"
        }
        Ok(Routing::Ignore) => {
            tracing::debug!(event = %event, action = %action, "Ignoring webhook");
            "ignored"
        }
        Err(e) => {
            tracing::warn!(event = %event, action = %action, error = %e, "Rejected webhook");
            return reject(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    (
        StatusCode::OK,
        Json(json!({ "status": status, "event": event, "action": action })),
    )
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
