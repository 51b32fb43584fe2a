//! Typed create/list over a [`RecordStore`].
//!
//! A [`RecordKind`] describes one entity: which request fields are required,
//! how a creation payload becomes a full record, and its name for logs.
//! [`RecordService`] does the rest the same way for every kind: validate,
//! stamp id and timestamp, persist the raw form, and type records on the way out.

use crate::models::{
    ChatMessage, ChatMessageCreate, Contact, ContactCreate, StatusCheck, StatusCheckCreate,
};
use crate::storage::{RawRecord, RecordStore};
use crate::{AppError, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use uuid::Uuid;

pub trait RecordKind: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Creation payload accepted from clients.
    type Input: DeserializeOwned;

    const NAME: &'static str;

    /// Fields that must be present in the payload as JSON strings.
    const REQUIRED_FIELDS: &'static [&'static str];

    /// Fields that may be omitted but must be strings when given.
    const OPTIONAL_FIELDS: &'static [&'static str] = &[];

    /// Name of the server-stamped creation time in the stored record.
    const TIMESTAMP_FIELD: &'static str = "timestamp";

    /// Rules beyond field presence and type.
    fn check(_input: &Self::Input) -> Result<()> {
        Ok(())
    }

    fn build(input: Self::Input, id: String, timestamp: DateTime<Utc>) -> Self;

    fn id(&self) -> &str;
}

impl RecordKind for StatusCheck {
    type Input = StatusCheckCreate;

    const NAME: &'static str = "status check";
    const REQUIRED_FIELDS: &'static [&'static str] = &["client_name"];

    fn build(input: StatusCheckCreate, id: String, timestamp: DateTime<Utc>) -> Self {
        StatusCheck {
            id,
            client_name: input.client_name,
            timestamp,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl RecordKind for Contact {
    type Input = ContactCreate;

    const NAME: &'static str = "contact";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name", "email", "subject", "message"];

    fn build(input: ContactCreate, id: String, timestamp: DateTime<Utc>) -> Self {
        Contact {
            id,
            name: input.name,
            email: input.email,
            subject: input.subject,
            message: input.message,
            timestamp,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl RecordKind for ChatMessage {
    type Input = ChatMessageCreate;

    const NAME: &'static str = "chat message";
    const REQUIRED_FIELDS: &'static [&'static str] = &["text"];
    const OPTIONAL_FIELDS: &'static [&'static str] = &["sender"];
    const TIMESTAMP_FIELD: &'static str = "createdAt";

    fn check(input: &ChatMessageCreate) -> Result<()> {
        if input.text.is_empty() {
            return Err(AppError::validation("text", "is required"));
        }
        Ok(())
    }

    fn build(input: ChatMessageCreate, id: String, timestamp: DateTime<Utc>) -> Self {
        ChatMessage {
            id,
            sender: input.sender,
            text: input.text,
            created_at: timestamp,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

// Offset-less forms, read as UTC
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 with any offset, and naive ISO-8601 date-times (`T` or
/// space separated) which are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Rewrite a string timestamp into canonical UTC form. Non-string values are left alone.
fn normalize_timestamp(raw: &mut RawRecord, field: &str) -> std::result::Result<(), String> {
    let parsed = match raw.get(field) {
        Some(Value::String(text)) => {
            parse_timestamp(text).ok_or_else(|| format!("invalid timestamp {:?}", text))?
        }
        _ => return Ok(()),
    };

    raw.insert(
        field.to_string(),
        Value::String(parsed.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    );
    Ok(())
}

pub struct RecordService<K> {
    store: RecordStore,
    _kind: PhantomData<fn() -> K>,
}

pub type StatusCheckService = RecordService<StatusCheck>;
pub type ContactService = RecordService<Contact>;
pub type ChatMessageService = RecordService<ChatMessage>;

impl<K: RecordKind> RecordService<K> {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            _kind: PhantomData,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Check the payload shape and decode it into the kind's input type.
    pub fn validate(payload: &Value) -> Result<K::Input> {
        let fields = payload
            .as_object()
            .ok_or_else(|| AppError::validation("body", "must be a JSON object"))?;

        for field in K::REQUIRED_FIELDS {
            match fields.get(*field) {
                None | Some(Value::Null) => {
                    return Err(AppError::validation(*field, "is required"));
                }
                Some(Value::String(_)) => {}
                Some(_) => return Err(AppError::validation(*field, "must be a string")),
            }
        }

        for field in K::OPTIONAL_FIELDS {
            match fields.get(*field) {
                None | Some(Value::String(_)) => {}
                Some(_) => return Err(AppError::validation(*field, "must be a string")),
            }
        }

        let input: K::Input = serde_json::from_value(payload.clone())
            .map_err(|e| AppError::validation("body", e.to_string()))?;
        K::check(&input)?;
        Ok(input)
    }

    /// Validate, stamp and persist a new record. Nothing is written if validation fails.
    pub async fn create(&self, payload: Value) -> Result<K> {
        let input = Self::validate(&payload)?;

        let record = K::build(input, Uuid::new_v4().to_string(), Utc::now());

        let raw = match serde_json::to_value(&record) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(AppError::Internal(format!(
                    "{} serialized to a non-object: {}",
                    K::NAME,
                    other
                )))
            }
            Err(e) => return Err(AppError::Internal(e.to_string())),
        };

        self.store.append_and_save(raw).await?;

        tracing::info!("Created {} {}", K::NAME, record.id());
        Ok(record)
    }

    /// All stored records in file order.
    pub async fn list(&self) -> Result<Vec<K>> {
        let raw_records = self.store.load().await?;

        raw_records
            .into_iter()
            .enumerate()
            .map(|(index, mut raw)| {
                let bad_record = |reason: String| {
                    AppError::StorageRead(format!(
                        "{} record {} in {}: {}",
                        K::NAME,
                        index,
                        self.store.path().display(),
                        reason
                    ))
                };

                normalize_timestamp(&mut raw, K::TIMESTAMP_FIELD).map_err(bad_record)?;
                serde_json::from_value::<K>(Value::Object(raw))
                    .map_err(|e| bad_record(e.to_string()))
            })
            .collect()
    }
}
