//! fetch_application_messages payloads, served by the coordinator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogKind {
    Stdout,
    Stderr,
}

/// One buffered line from the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMessage {
    pub log_kind: LogKind,
    pub message: String,
}

/// Request payload for fetch_application_messages. Empty today.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchMessagesRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchMessagesResponse {
    #[serde(default)]
    pub messages: Vec<AppMessage>,
}
