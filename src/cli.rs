//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. Arguments that correspond to configuration keys are merged on
//! top of the `notifan.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Fan a notification out to every configured push channel.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to a repository_dispatch event payload.
    #[arg(long, value_name = "FILE", env = "GITHUB_EVENT_PATH")]
    pub event_path: Option<PathBuf>,

    /// Name of the triggering event. Only `repository_dispatch` is accepted.
    #[arg(long, value_name = "NAME", env = "GITHUB_EVENT_NAME")]
    pub event_name: Option<String>,

    /// Notification title. Used instead of an event payload.
    #[arg(short, long)]
    pub title: Option<String>,

    /// Notification body. Used instead of an event payload.
    #[arg(long)]
    pub content: Option<String>,

    /// Source identifier attached to a direct notification.
    #[arg(long)]
    pub source: Option<String>,

    /// Dispatch timeout in seconds, before the grace period.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Maximum number of channels sending at once.
    #[arg(long, value_name = "N")]
    pub max_concurrency: Option<usize>,

    /// Attempts per channel, including the first.
    #[arg(long, value_name = "N")]
    pub retry_attempts: Option<u32>,

    /// Log level filter, e.g. `debug` or `notifan=trace`.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Print the dispatch summary as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// List channels and whether they are configured, then exit.
    #[arg(long)]
    pub list_channels: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut retry = Dict::new();
        if let Some(attempts) = self.retry_attempts {
            retry.insert("max_attempts".into(), Value::from(u64::from(attempts)));
        }

        let mut dispatch = Dict::new();
        if let Some(timeout) = self.timeout {
            dispatch.insert("timeout_seconds".into(), Value::from(timeout));
        }
        if let Some(limit) = self.max_concurrency {
            dispatch.insert("max_concurrency".into(), Value::from(limit as u64));
        }
        if !retry.is_empty() {
            dispatch.insert("retry".into(), Value::from(retry));
        }

        let mut dict = Dict::new();
        if !dispatch.is_empty() {
            dict.insert("dispatch".into(), Value::from(dispatch));
        }
        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
