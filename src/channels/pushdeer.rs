//! PushDeer push, hosted or self-hosted.

use super::{json_message, non_empty, read_json};
use crate::config::PushDeerConfig;
use crate::core::{ChannelAdapter, ChannelResult, SendError};
use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

const DEFAULT_URL: &str = "https://api2.pushdeer.com/message/push";

pub struct PushDeerChannel {
    config: PushDeerConfig,
    client: reqwest::Client,
}

impl PushDeerChannel {
    pub fn new(config: PushDeerConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

/// PushDeer answers `{"code":0,"content":{"result":[...]}}`; an empty result
/// list means no device received the message.
fn delivered(body: &Value) -> bool {
    body.pointer("/content/result")
        .and_then(Value::as_array)
        .is_some_and(|result| !result.is_empty())
}

#[async_trait]
impl ChannelAdapter for PushDeerChannel {
    fn name(&self) -> &str {
        "PushDeer"
    }

    fn is_configured(&self) -> bool {
        non_empty(&self.config.key).is_some()
    }

    #[instrument(skip_all)]
    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError> {
        let key = non_empty(&self.config.key)
            .ok_or_else(|| SendError::configuration("pushdeer key is not set"))?;
        let url = non_empty(&self.config.url).unwrap_or(DEFAULT_URL);
        let response = self
            .client
            .post(url)
            .form(&[
                ("text", title),
                ("desp", content),
                ("type", "markdown"),
                ("pushkey", key),
            ])
            .send()
            .await?;
        let body = read_json(response).await?;

        if delivered(&body) {
            Ok(ChannelResult::success(self.name(), "message pushed"))
        } else {
            Ok(ChannelResult::failure(
                self.name(),
                "message not delivered",
                json_message(&body, &["error", "message"]),
            ))
        }
    }
}
