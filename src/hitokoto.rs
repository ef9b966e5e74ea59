//! Optional quote from the hitokoto service, appended to each message.

use crate::config::HitokotoConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Quote {
    pub hitokoto: String,
    #[serde(default)]
    pub from: String,
}

impl Quote {
    /// The text appended after the message body.
    pub fn render(&self) -> String {
        format!("\n\n{}    ----{}", self.hitokoto, self.from)
    }
}

pub async fn fetch_quote(client: &reqwest::Client, config: &HitokotoConfig) -> Result<Quote> {
    let quote = client
        .get(&config.url)
        .timeout(Duration::from_secs(config.timeout_seconds))
        .send()
        .await
        .context("hitokoto request failed")?
        .error_for_status()?
        .json::<Quote>()
        .await
        .context("invalid hitokoto response")?;
    debug!(from = %quote.from, "Fetched hitokoto quote");
    Ok(quote)
}

/// Returns `content` with a quote appended, or unchanged when the quote
/// cannot be fetched.
pub async fn with_quote(client: &reqwest::Client, config: &HitokotoConfig, content: &str) -> String {
    match fetch_quote(client, config).await {
        Ok(quote) => format!("{}{}", content, quote.render()),
        Err(e) => {
            warn!(error = %e, "Failed to fetch hitokoto quote, sending without it");
            content.to_string()
        }
    }
}
