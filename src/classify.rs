//! Classification of channel failures into retryable and fatal errors.
//!
//! Channels report failures two ways: by returning `Err(SendError)` or by
//! returning a negative [`ChannelResult`]. Both are funnelled through here before
//! the retry engine sees them, so the same policy applies to either shape.

use crate::core::{ChannelResult, ErrorKind, SendError};

/// Wording that points at the transport rather than the request.
const NETWORK_KEYWORDS: &[&str] = &[
    "timeout",
    "timed out",
    "network",
    "connection",
    "连接",
    "网络",
];

/// Wording that points at a transient condition on the remote service.
const TRANSIENT_KEYWORDS: &[&str] = &[
    "temporary",
    "temporarily",
    "临时",
    "429",
    "502",
    "503",
    "504",
    "service unavailable",
    "服务不可用",
    "too many requests",
    "bad gateway",
    "gateway timeout",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Returns the retryable kind implied by an error message, if any.
pub fn transient_kind(message: &str) -> Option<ErrorKind> {
    let lower = message.to_lowercase();
    if contains_any(&lower, NETWORK_KEYWORDS) {
        Some(ErrorKind::Network)
    } else if contains_any(&lower, TRANSIENT_KEYWORDS) {
        Some(ErrorKind::Temporary)
    } else {
        None
    }
}

/// Returns true if the message carries any transient-failure indicator.
pub fn is_transient_message(message: &str) -> bool {
    transient_kind(message).is_some()
}

/// Turns a negative result with transient wording into a retryable error.
///
/// Positive results and negative results without such wording pass through
/// unchanged.
pub fn classify_result(result: ChannelResult) -> Result<ChannelResult, SendError> {
    if result.success {
        return Ok(result);
    }
    let Some(error) = result.error.as_deref() else {
        return Ok(result);
    };
    match transient_kind(error) {
        Some(kind) => Err(SendError::new(kind, error)),
        None => Ok(result),
    }
}

/// Upgrades a permanent error to a network error when its detail says the
/// failure was really transport-level.
pub fn classify_error(err: SendError) -> SendError {
    match err.kind {
        ErrorKind::Permanent if is_transient_message(&err.detail) => {
            SendError::new(ErrorKind::Network, err.detail)
        }
        _ => err,
    }
}
