use crate::{models::ChatMessage, AppState, Result};
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde_json::Value;
use std::sync::Arc;

pub async fn create_chat_message(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ChatMessage>> {
    let Json(payload) = payload?;
    let record = state.chat_messages.create(payload).await?;
    Ok(Json(record))
}

pub async fn list_chat_messages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ChatMessage>>> {
    Ok(Json(state.chat_messages.list().await?))
}
