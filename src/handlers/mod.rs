pub mod chat;
pub mod contact;
pub mod status;

use crate::{AppError, AppState};
use axum::{extract::State, http::Uri, Json};
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello World" }))
}

/// Liveness plus a read of every collection.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status_checks = state.status_checks.store().len().await;
    let contacts = state.contacts.store().len().await;
    let chat_messages = state.chat_messages.store().len().await;

    match (status_checks, contacts, chat_messages) {
        (Ok(status_checks), Ok(contacts), Ok(chat_messages)) => Json(json!({
            "status": "healthy",
            "app": env!("CARGO_PKG_NAME"),
            "driver": "file",
            "collections": {
                "status_checks": status_checks,
                "contacts": contacts,
                "chat_messages": chat_messages
            }
        })),
        (status_checks, contacts, chat_messages) => {
            let error = status_checks
                .err()
                .or(contacts.err())
                .or(chat_messages.err())
                .map(|e| e.to_string());
            tracing::warn!("Health check degraded: {:?}", error);
            Json(json!({
                "status": "degraded",
                "app": env!("CARGO_PKG_NAME"),
                "driver": "file",
                "error": error
            }))
        }
    }
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
