use crate::{models::StatusCheck, AppState, Result};
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde_json::Value;
use std::sync::Arc;

pub async fn create_status_check(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<StatusCheck>> {
    let Json(payload) = payload?;
    let record = state.status_checks.create(payload).await?;
    Ok(Json(record))
}

pub async fn list_status_checks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StatusCheck>>> {
    Ok(Json(state.status_checks.list().await?))
}
