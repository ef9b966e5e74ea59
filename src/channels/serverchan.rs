//! ServerChan (Server酱) push.

use super::{json_i64, json_message, non_empty, read_json};
use crate::config::ServerChanConfig;
use crate::core::{ChannelAdapter, ChannelResult, SendError};
use async_trait::async_trait;
use tracing::instrument;

pub struct ServerChanChannel {
    config: ServerChanConfig,
    client: reqwest::Client,
}

impl ServerChanChannel {
    pub fn new(config: ServerChanConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Turbo keys start with `SCT` and use the newer API host.
    fn endpoint(&self, key: &str) -> String {
        if let Some(url) = non_empty(&self.config.url) {
            return format!("{}/{}.send", url.trim_end_matches('/'), key);
        }
        if key.starts_with("SCT") {
            format!("https://sctapi.ftqq.com/{}.send", key)
        } else {
            format!("https://sc.ftqq.com/{}.send", key)
        }
    }
}

#[async_trait]
impl ChannelAdapter for ServerChanChannel {
    fn name(&self) -> &str {
        "ServerChan"
    }

    fn is_configured(&self) -> bool {
        non_empty(&self.config.key).is_some()
    }

    #[instrument(skip_all)]
    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError> {
        let key = non_empty(&self.config.key)
            .ok_or_else(|| SendError::configuration("serverchan key is not set"))?;
        // Markdown needs a blank line for a visible line break.
        let desp = content.replace('\n', "\n\n");
        let response = self
            .client
            .post(self.endpoint(key))
            .form(&[("text", title), ("desp", desp.as_str())])
            .send()
            .await?;
        let body = read_json(response).await?;

        if json_i64(&body, "code") == Some(0) || json_i64(&body, "errno") == Some(0) {
            Ok(ChannelResult::success(self.name(), "message sent"))
        } else {
            Ok(ChannelResult::failure(
                self.name(),
                "message rejected",
                json_message(&body, &["message", "errmsg", "error"]),
            ))
        }
    }
}
