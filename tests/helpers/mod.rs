#![allow(dead_code)]


use notifan::channels::test_utils::ScriptedChannel;
use notifan::core::ChannelAdapter;
use notifan::dispatcher::DispatchConfig;
use notifan::retry::RetryConfig;
use std::sync::Arc;

/// A dispatch config with millisecond backoff so retries don't slow tests down.
pub fn fast_dispatch_config() -> DispatchConfig {
    DispatchConfig {
        retry: RetryConfig {
            base_delay_seconds: 0.01,
            max_delay_seconds: 0.05,
            jitter: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn adapters(channels: Vec<ScriptedChannel>) -> Vec<Arc<dyn ChannelAdapter>> {
    channels
        .into_iter()
        .map(|c| Arc::new(c) as Arc<dyn ChannelAdapter>)
        .collect()
}
