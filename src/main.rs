//! notifan - notification fan-out
//!
//! Reads a notification from a GitHub `repository_dispatch` event (or from the
//! command line), sends it to every configured channel and exits non-zero
//! when no channel delivered it.

use anyhow::{bail, Result};
use clap::Parser;
use notifan::{
    cli::Cli,
    config::Config,
    core::NotificationRequest,
    event::{check_event_name, EventPayload},
    service::NotificationService,
    summary::DispatchSummary,
};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(level: &str) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            init_tracing("info");
            error!("Failed to load configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.log_level);

    match run(cli, config).await {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, mut config: Config) -> Result<ExitCode> {
    // stdout carries only the JSON summary.
    if cli.json {
        config.channels.console.stderr = true;
    }

    info!("notifan starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Timeout: {}s", config.dispatch.timeout_seconds);
    info!("Max Concurrency: {}", config.dispatch.max_concurrency);
    info!("Retry Attempts: {}", config.dispatch.retry.max_attempts);
    info!("Skip Titles: {}", config.dispatch.skip_titles.len());
    info!("Hitokoto: {}", if config.hitokoto.enabled { "Enabled" } else { "Disabled" });
    info!("-------------------------------------------------------");

    let service = NotificationService::from_config(config)?;
    let active = service.active_channels();
    info!(count = active.len(), channels = %active.join(", "), "Configured channels");

    if cli.list_channels {
        for channel in service.channels() {
            let state = if channel.is_configured() { "configured" } else { "not configured" };
            println!("{:<12} {}", channel.name(), state);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let summary = if cli.title.is_some() || cli.content.is_some() {
        let request = NotificationRequest::new(
            cli.title.clone().unwrap_or_else(|| "Notification".to_string()),
            cli.content.clone().unwrap_or_default(),
            cli.source.clone().unwrap_or_else(|| "unknown".to_string()),
        );
        service.send(&request).await
    } else if let Some(path) = &cli.event_path {
        if let Some(name) = &cli.event_name {
            check_event_name(name)?;
        }
        info!(path = %path.display(), "Reading event payload");
        let event = EventPayload::from_path(path)?;
        service.process_event(event).await?
    } else {
        bail!("nothing to send: pass --title/--content or an event file via --event-path or GITHUB_EVENT_PATH");
    };

    report(&summary, cli.json)?;
    Ok(exit_code(&summary))
}

fn report(summary: &DispatchSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    }
    info!(
        total = summary.total,
        successful = summary.successful.len(),
        failed = summary.failed.len(),
        "Dispatch finished"
    );
    if !summary.successful.is_empty() {
        info!("Delivered via: {}", summary.successful.join(", "));
    }
    for err in &summary.errors {
        warn!("{}", err);
    }
    Ok(())
}

/// A dispatch skipped before selection is not a failure; one where every
/// selected channel failed is.
fn exit_code(summary: &DispatchSummary) -> ExitCode {
    if summary.total == 0 || summary.any_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
