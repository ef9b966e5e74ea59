//! iGot aggregated push.

use super::{json_i64, json_message, non_empty, read_json};
use crate::config::IGotConfig;
use crate::core::{ChannelAdapter, ChannelResult, SendError};
use async_trait::async_trait;
use tracing::instrument;

const DEFAULT_URL: &str = "https://push.hellyw.com";

pub struct IGotChannel {
    config: IGotConfig,
    client: reqwest::Client,
}

impl IGotChannel {
    pub fn new(config: IGotConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl ChannelAdapter for IGotChannel {
    fn name(&self) -> &str {
        "iGot"
    }

    fn is_configured(&self) -> bool {
        non_empty(&self.config.key).is_some()
    }

    #[instrument(skip_all)]
    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError> {
        let key = non_empty(&self.config.key)
            .ok_or_else(|| SendError::configuration("igot key is not set"))?;
        let base = non_empty(&self.config.url).unwrap_or(DEFAULT_URL);
        let response = self
            .client
            .post(format!("{}/{}", base.trim_end_matches('/'), key))
            .form(&[("title", title), ("content", content)])
            .send()
            .await?;
        let body = read_json(response).await?;

        if json_i64(&body, "ret") == Some(0) {
            Ok(ChannelResult::success(self.name(), "message sent"))
        } else {
            Ok(ChannelResult::failure(
                self.name(),
                "message rejected",
                json_message(&body, &["errMsg"]),
            ))
        }
    }
}
