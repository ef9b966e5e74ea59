//! Aggregation of per-channel results into one dispatch summary.

use crate::core::ChannelResult;
use serde::{Deserialize, Serialize};

/// Error recorded when content is empty.
pub const CONTENT_EMPTY: &str = "content empty";
/// Error recorded when the title is in the skip list.
pub const TITLE_SKIPPED: &str = "title in skip list";
/// Error recorded when no channel is configured.
pub const NO_CHANNELS: &str = "no configured channels";
/// Error recorded for channels that did not finish before the deadline.
pub const TIMEOUT: &str = "timeout";

/// The outcome of one dispatch across all selected channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DispatchSummary {
    /// Number of channels selected for this run
    pub total: usize,
    /// Channels that delivered, in completion order
    pub successful: Vec<String>,
    /// Channels that failed, in completion order
    pub failed: Vec<String>,
    pub errors: Vec<String>,
}

impl DispatchSummary {
    /// A summary for a dispatch that stopped before any channel was selected.
    pub fn skipped(reason: &str) -> Self {
        Self {
            errors: vec![reason.to_string()],
            ..Default::default()
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.total > 0 && self.failed.is_empty()
    }

    pub fn any_succeeded(&self) -> bool {
        !self.successful.is_empty()
    }
}

/// Accumulates results as they arrive. Owned by the single collector.
#[derive(Debug)]
pub struct SummaryBuilder {
    summary: DispatchSummary,
}

impl SummaryBuilder {
    pub fn new(total: usize) -> Self {
        Self {
            summary: DispatchSummary {
                total,
                ..Default::default()
            },
        }
    }

    /// Records one channel outcome.
    pub fn record(&mut self, result: ChannelResult) {
        if result.success {
            self.summary.successful.push(result.channel);
        } else {
            let error = result.error.unwrap_or_else(|| "unknown error".to_string());
            self.summary
                .errors
                .push(format!("{}: {}", result.channel, error));
            self.summary.failed.push(result.channel);
        }
    }

    /// Records a channel that was still outstanding at the deadline.
    pub fn record_timeout(&mut self, channel: &str) {
        self.record(ChannelResult::failure(channel, "send failed", TIMEOUT));
    }

    pub fn recorded(&self) -> usize {
        self.summary.successful.len() + self.summary.failed.len()
    }

    pub fn finish(self) -> DispatchSummary {
        self.summary
    }
}
