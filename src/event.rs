//! GitHub `repository_dispatch` event payloads.
//!
//! A sender repository triggers notifan with a `repository_dispatch` event whose
//! `client_payload` carries the notification. The runner writes the event JSON
//! to the file named by `GITHUB_EVENT_PATH`.

use crate::core::NotificationRequest;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// The only event notifan accepts.
pub const REPOSITORY_DISPATCH: &str = "repository_dispatch";

/// Sources senders are known to use. Others are accepted with a warning.
pub const KNOWN_SOURCES: &[&str] = &["glados", "airport", "unknown"];

const DEFAULT_TITLE: &str = "Notification";
const DEFAULT_SOURCE: &str = "unknown";

#[derive(Error, Debug)]
pub enum EventError {
    #[error("unsupported event type '{0}', expected repository_dispatch")]
    UnsupportedEvent(String),
    #[error("failed to read event file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid event JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("client_payload is not an object")]
    PayloadNotObject,
    #[error("client_payload is missing required field '{0}'")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Sender {
    #[serde(default)]
    pub login: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Repository {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// The parts of a `repository_dispatch` event notifan reads.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EventPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub sender: Option<Sender>,
    #[serde(default)]
    pub repository: Option<Repository>,
    /// Kept untyped so a malformed payload is reported by `validate`.
    #[serde(default)]
    pub client_payload: Value,
}

/// Fails unless `name` is `repository_dispatch`.
pub fn check_event_name(name: &str) -> Result<(), EventError> {
    if name == REPOSITORY_DISPATCH {
        Ok(())
    } else {
        Err(EventError::UnsupportedEvent(name.to_string()))
    }
}

/// Renders a payload value as text. Strings are taken verbatim.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

impl EventPayload {
    pub fn from_path(path: &Path) -> Result<Self, EventError> {
        let raw = std::fs::read_to_string(path).map_err(|source| EventError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(raw)?)
    }

    fn payload(&self) -> Option<&Map<String, Value>> {
        self.client_payload.as_object()
    }

    fn field(&self, key: &str) -> Option<&Value> {
        self.payload().and_then(|p| p.get(key))
    }

    /// Checks the payload shape. Empty fields and unknown sources only warn.
    pub fn validate(&self) -> Result<(), EventError> {
        let payload = self.payload().ok_or(EventError::PayloadNotObject)?;

        for field in ["title", "content"] {
            match payload.get(field) {
                None => return Err(EventError::MissingField(field)),
                Some(value) if is_empty_value(value) => {
                    warn!(field, "client_payload field is empty");
                }
                Some(_) => {}
            }
        }

        let source = self.source();
        if !KNOWN_SOURCES.contains(&source.as_str()) {
            warn!(source = %source, "Unknown event source");
        }
        Ok(())
    }

    fn source(&self) -> String {
        self.field("source")
            .map(value_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string())
    }

    /// Builds the request, filling in the default title and source.
    pub fn into_request(self) -> NotificationRequest {
        let title = self
            .field("title")
            .map(value_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let content = self.field("content").map(value_text).unwrap_or_default();
        NotificationRequest::new(title, content, self.source())
    }

    pub fn log_details(&self) {
        let unknown = || "unknown".to_string();
        info!(
            action = %self.action.clone().unwrap_or_else(unknown),
            sender = %self.sender.as_ref().and_then(|s| s.login.clone()).unwrap_or_else(unknown),
            repository = %self.repository.as_ref().and_then(|r| r.full_name.clone()).unwrap_or_else(unknown),
            received_at = %chrono::Utc::now().to_rfc3339(),
            "Received repository_dispatch event"
        );
        if self.payload().is_some_and(|p| !p.is_empty()) {
            info!(
                title = %self.field("title").map(value_text).unwrap_or_else(|| "N/A".to_string()),
                content_len = self.field("content").map(value_text).unwrap_or_default().chars().count(),
                source = %self.source(),
                timestamp = %self.field("timestamp").map(value_text).unwrap_or_else(|| "N/A".to_string()),
                "Event payload"
            );
        }
    }
}
