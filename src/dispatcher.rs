//! Concurrent fan-out of one notification to every configured channel.
//!
//! Each selected channel gets exactly one task in a bounded pool. Tasks run the
//! retry engine around the channel's `send` and report a single
//! [`ChannelResult`] over an mpsc channel; the collector drains it in
//! completion order until every channel has reported or the global deadline
//! passes.
//!
//! Cancellation at the deadline is advisory. Outstanding tasks are aborted,
//! which stops them at their next await point, but a request that has already
//! been written to the socket is abandoned rather than recalled.

use crate::classify::{classify_error, classify_result};
use crate::core::{ChannelAdapter, ChannelResult, NotificationRequest};
use crate::retry::{RetryConfig, RetryConfigError, RetryPolicy};
use crate::summary::{self, DispatchSummary, SummaryBuilder};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, instrument, warn};

/// Extra time allowed beyond `timeout_seconds` before outstanding channels are
/// given up on.
pub const GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Stand-in deadline when `now + deadline()` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Settings for one dispatch.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Nominal time budget for the whole dispatch, in seconds
    pub timeout_seconds: u64,
    /// Upper bound on channels sending at the same time
    pub max_concurrency: usize,
    /// Per-channel retry settings
    pub retry: RetryConfig,
    /// Titles that are never sent
    pub skip_titles: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_concurrency: 10,
            retry: RetryConfig::default(),
            skip_titles: Vec::new(),
        }
    }
}

impl DispatchConfig {
    /// The total time the collector waits for results.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds).saturating_add(GRACE_PERIOD)
    }

    /// Number of workers for `selected` channels.
    pub fn max_workers(&self, selected: usize) -> usize {
        selected.min(self.max_concurrency.max(1))
    }

    pub fn is_skipped_title(&self, title: &str) -> bool {
        self.skip_titles.iter().any(|skip| skip == title)
    }
}

/// Runs dispatches with a fixed configuration and retry policy.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: DispatchConfig,
    policy: Arc<RetryPolicy>,
}

impl Dispatcher {
    /// Creates a dispatcher, validating the retry settings.
    pub fn new(config: DispatchConfig) -> Result<Self, RetryConfigError> {
        let policy = config.retry.to_policy()?;
        Ok(Self::with_policy(config, policy))
    }

    /// Creates a dispatcher with an explicit policy, ignoring `config.retry`.
    pub fn with_policy(config: DispatchConfig, policy: RetryPolicy) -> Self {
        Self {
            config,
            policy: Arc::new(policy),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `title` and `content` to every configured adapter.
    ///
    /// Never fails: every outcome, including skipping the dispatch entirely, is
    /// reported through the returned summary.
    #[instrument(skip(self, content, adapters), fields(channels = adapters.len()))]
    pub async fn dispatch(
        &self,
        title: &str,
        content: &str,
        adapters: &[Arc<dyn ChannelAdapter>],
    ) -> DispatchSummary {
        if content.is_empty() {
            warn!("Notification content is empty, nothing to send.");
            return DispatchSummary::skipped(summary::CONTENT_EMPTY);
        }
        if self.config.is_skipped_title(title) {
            info!("Title is in the skip list, not sending.");
            return DispatchSummary::skipped(summary::TITLE_SKIPPED);
        }

        let selected: Vec<Arc<dyn ChannelAdapter>> = adapters
            .iter()
            .filter(|adapter| adapter.is_configured())
            .cloned()
            .collect();
        if selected.is_empty() {
            warn!("No notification channels are configured.");
            return DispatchSummary::skipped(summary::NO_CHANNELS);
        }

        let max_workers = self.config.max_workers(selected.len());
        info!(
            "Dispatching to {} channels with {} workers, timeout {}s (+{}s grace)",
            selected.len(),
            max_workers,
            self.config.timeout_seconds,
            GRACE_PERIOD.as_secs()
        );

        let started = Instant::now();
        let summary = self.run_pool(title, content, selected, max_workers).await;
        metrics::histogram!("notification_dispatch_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        info!(
            "Dispatch finished: {} channels, {} succeeded, {} failed",
            summary.total,
            summary.successful.len(),
            summary.failed.len()
        );
        if !summary.successful.is_empty() {
            info!("Succeeded: {}", summary.successful.join(", "));
        }
        if !summary.failed.is_empty() {
            warn!("Failed: {}", summary.failed.join(", "));
        }
        summary
    }

    pub async fn dispatch_request(
        &self,
        request: &NotificationRequest,
        adapters: &[Arc<dyn ChannelAdapter>],
    ) -> DispatchSummary {
        self.dispatch(&request.title, &request.content, adapters).await
    }

    async fn run_pool(
        &self,
        title: &str,
        content: &str,
        selected: Vec<Arc<dyn ChannelAdapter>>,
        max_workers: usize,
    ) -> DispatchSummary {
        let total = selected.len();
        let title: Arc<str> = Arc::from(title);
        let content: Arc<str> = Arc::from(content);
        let (result_tx, mut result_rx) = mpsc::channel::<(usize, ChannelResult)>(total);
        let slots = Arc::new(Semaphore::new(max_workers));

        let mut pending: Vec<Option<String>> = selected
            .iter()
            .map(|adapter| Some(adapter.name().to_string()))
            .collect();
        let mut builder = SummaryBuilder::new(total);
        let mut workers = JoinSet::new();

        let now = Instant::now();
        let deadline = now
            .checked_add(self.config.deadline())
            .unwrap_or_else(|| now + FAR_FUTURE);
        for (index, adapter) in selected.into_iter().enumerate() {
            let result_tx = result_tx.clone();
            let slots = slots.clone();
            let policy = self.policy.clone();
            let title = title.clone();
            let content = content.clone();

            workers.spawn(async move {
                let name = adapter.name().to_string();
                let result = match slots.acquire_owned().await {
                    Ok(_permit) => {
                        AssertUnwindSafe(send_with_retry(adapter, &policy, &title, &content))
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|panic| {
                                ChannelResult::failure(
                                    name.as_str(),
                                    "send failed",
                                    format!("channel panicked: {}", panic_message(panic.as_ref())),
                                )
                            })
                    }
                    Err(e) => ChannelResult::failure(
                        name.as_str(),
                        "send failed",
                        format!("failed to acquire a worker slot: {}", e),
                    ),
                };
                // The collector is gone only after the deadline, when nobody reads this.
                let _ = result_tx.send((index, result)).await;
            });
        }
        drop(result_tx);

        let mut timed_out = false;
        while builder.recorded() < total {
            match timeout_at(deadline, result_rx.recv()).await {
                Ok(Some((index, result))) => {
                    let Some(channel) = pending.get_mut(index).and_then(Option::take) else {
                        continue;
                    };
                    let position = builder.recorded() + 1;
                    record_metrics(&channel, result.success);
                    if result.success {
                        info!("[{}/{}] {} succeeded: {}", position, total, channel, result.message);
                    } else {
                        error!(
                            "[{}/{}] {} failed: {}",
                            position,
                            total,
                            channel,
                            result.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                    builder.record(result);
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }

        let outstanding: Vec<String> = pending.iter_mut().filter_map(Option::take).collect();
        if outstanding.is_empty() {
            workers.shutdown().await;
        } else {
            if timed_out {
                warn!(
                    "{} channels did not finish within {}s: {}",
                    outstanding.len(),
                    self.config.deadline().as_secs(),
                    outstanding.join(", ")
                );
            }
            for channel in &outstanding {
                record_metrics(channel, false);
                if timed_out {
                    builder.record_timeout(channel);
                } else {
                    builder.record(ChannelResult::failure(
                        channel.as_str(),
                        "send failed",
                        "worker exited without reporting a result",
                    ));
                }
            }
            // Advisory: tasks stuck outside an await point keep running until they yield.
            workers.abort_all();
        }

        builder.finish()
    }
}

/// Dispatches with a one-off configuration.
///
/// An invalid retry configuration is reported in the summary instead of
/// dispatching.
pub async fn dispatch(
    title: &str,
    content: &str,
    adapters: &[Arc<dyn ChannelAdapter>],
    config: &DispatchConfig,
) -> DispatchSummary {
    match Dispatcher::new(config.clone()) {
        Ok(dispatcher) => dispatcher.dispatch(title, content, adapters).await,
        Err(e) => {
            error!(error = %e, "Invalid retry configuration");
            DispatchSummary::skipped(&format!("invalid retry configuration: {}", e))
        }
    }
}

/// Runs one channel's attempt loop and normalizes the outcome.
#[instrument(skip_all, fields(channel = %adapter.name()))]
async fn send_with_retry(
    adapter: Arc<dyn ChannelAdapter>,
    policy: &RetryPolicy,
    title: &str,
    content: &str,
) -> ChannelResult {
    let name = adapter.name().to_string();
    let channel = adapter.as_ref();

    let outcome = policy
        .execute_with_retry(&name, move || async move {
            match channel.send(title, content).await {
                Ok(result) => classify_result(result),
                Err(e) => Err(classify_error(e)),
            }
        })
        .await;

    match outcome {
        Ok(mut result) => {
            // The adapter's name is the aggregation key, whatever the result says.
            result.channel = name;
            if result.success {
                result.error = None;
            } else if result.error.is_none() {
                result.error = Some(result.message.clone());
            }
            result
        }
        Err(e) => ChannelResult::failure(name, "send failed", e.to_string()),
    }
}

fn record_metrics(channel: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    metrics::counter!(
        "notifications_channel_total",
        "channel" => channel.to_string(),
        "status" => status
    )
    .increment(1);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
