/// notifan - fan a notification out to many push services at once
///
/// This library provides the dispatcher, the retry engine and the built-in
/// channel adapters behind the `notifan` binary.
pub mod channels;
pub mod classify;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatcher;
pub mod event;
pub mod hitokoto;
pub mod retry;
pub mod service;
pub mod summary;

// Re-export core types for convenience
pub use crate::core::*;
pub use crate::dispatcher::{dispatch, DispatchConfig, Dispatcher};
pub use crate::retry::{BackoffStrategy, RetryConfig, RetryPolicy};
pub use crate::summary::DispatchSummary;
