//! Core domain types and service traits for notifan
//!
//! This module defines the fundamental data structures and the trait contract
//! every delivery channel implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single notification to be fanned out to every configured channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NotificationRequest {
    /// Short headline shown by most channels
    pub title: String,
    /// Message body
    pub content: String,
    /// Identifier of the system that produced the notification
    pub source: String,
}

impl NotificationRequest {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source: source.into(),
        }
    }
}

/// The final outcome of delivering to one channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelResult {
    pub success: bool,
    /// Name of the channel this result belongs to
    pub channel: String,
    /// Human-readable status line
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelResult {
    /// Creates a positive result.
    pub fn success(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: message.into(),
            error: None,
        }
    }

    /// Creates a negative result carrying an error description.
    pub fn failure(
        channel: impl Into<String>,
        message: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: message.into(),
            error: Some(error.into()),
        }
    }
}

/// Classification of a failed send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection refused, reset, DNS failure and the like
    Network,
    /// The remote service signalled a transient condition
    Temporary,
    /// The request did not complete in time
    Timeout,
    /// Anything that will not get better by retrying
    Permanent,
    /// The channel is missing required settings
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Network => "network error",
            ErrorKind::Temporary => "temporary error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Permanent => "permanent error",
            ErrorKind::Configuration => "configuration error",
        };
        f.write_str(label)
    }
}

/// An error raised by a channel while sending.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {detail}")]
pub struct SendError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl SendError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, detail)
    }

    pub fn temporary(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Temporary, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, detail)
    }

    pub fn permanent(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, detail)
    }

    pub fn configuration(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, detail)
    }
}

impl From<reqwest::Error> for SendError {
    fn from(err: reqwest::Error) -> Self {
        // A request that cannot even be built means a bad URL or header in the config.
        if err.is_builder() {
            SendError::configuration(err.to_string())
        } else if err.is_timeout() {
            SendError::timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            SendError::network(err.to_string())
        } else if let Some(status) = err.status() {
            if status.is_server_error() || status.as_u16() == 429 {
                SendError::temporary(format!("HTTP {}", status))
            } else {
                SendError::permanent(format!("HTTP {}", status))
            }
        } else if err.is_decode() {
            SendError::permanent(format!("invalid response body: {}", err))
        } else {
            SendError::network(err.to_string())
        }
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// A destination service capable of delivering a title + content message.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// A stable, unique name used as the aggregation key and in logs.
    fn name(&self) -> &str;

    /// Whether the channel has all the settings it needs. Must not do I/O.
    fn is_configured(&self) -> bool;

    /// Delivers one message.
    ///
    /// # Returns
    /// * `Ok(ChannelResult)` for a typed answer from the service, positive or negative
    /// * `Err(SendError)` when the attempt failed before a typed answer was available
    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError>;
}
