use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A client's liveness report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCheck {
    pub id: String,
    pub client_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct StatusCheckCreate {
    pub client_name: String,
}

/// A message left through the contact form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ContactCreate {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// One line of the site chat widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageCreate {
    #[serde(default = "default_sender")]
    pub sender: String,
    pub text: String,
}

fn default_sender() -> String {
    "user".to_string()
}
