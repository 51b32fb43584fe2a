use crate::{models::Contact, AppState, Result};
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde_json::Value;
use std::sync::Arc;

pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Contact>> {
    let Json(payload) = payload?;
    tracing::debug!("Received contact message");

    let record = state.contacts.create(payload).await?;
    Ok(Json(record))
}

pub async fn list_contacts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Contact>>> {
    Ok(Json(state.contacts.list().await?))
}
