//! Self-hosted Gotify server.

use super::{json_message, non_empty, read_json};
use crate::config::GotifyConfig;
use crate::core::{ChannelAdapter, ChannelResult, SendError};
use async_trait::async_trait;
use tracing::instrument;

pub struct GotifyChannel {
    config: GotifyConfig,
    client: reqwest::Client,
}

impl GotifyChannel {
    pub fn new(config: GotifyConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl ChannelAdapter for GotifyChannel {
    fn name(&self) -> &str {
        "Gotify"
    }

    fn is_configured(&self) -> bool {
        non_empty(&self.config.url).is_some() && non_empty(&self.config.token).is_some()
    }

    #[instrument(skip_all)]
    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError> {
        let (Some(url), Some(token)) = (non_empty(&self.config.url), non_empty(&self.config.token))
        else {
            return Err(SendError::configuration("gotify url or token is not set"));
        };

        let priority = self.config.priority.to_string();
        let response = self
            .client
            .post(format!("{}/message", url.trim_end_matches('/')))
            .query(&[("token", token)])
            .form(&[("title", title), ("message", content), ("priority", priority.as_str())])
            .send()
            .await?;
        let body = read_json(response).await?;

        if body.get("id").is_some() {
            Ok(ChannelResult::success(self.name(), "message created"))
        } else {
            Ok(ChannelResult::failure(
                self.name(),
                "message rejected",
                json_message(&body, &["errorDescription", "error"]),
            ))
        }
    }
}
