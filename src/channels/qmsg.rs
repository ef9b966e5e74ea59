//! Qmsg (QQ) push.

use super::{json_i64, json_message, non_empty, read_json};
use crate::config::QmsgConfig;
use crate::core::{ChannelAdapter, ChannelResult, SendError};
use async_trait::async_trait;
use tracing::instrument;

const DEFAULT_URL: &str = "https://qmsg.zendee.cn";

pub struct QmsgChannel {
    config: QmsgConfig,
    client: reqwest::Client,
}

impl QmsgChannel {
    pub fn new(config: QmsgConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl ChannelAdapter for QmsgChannel {
    fn name(&self) -> &str {
        "Qmsg"
    }

    fn is_configured(&self) -> bool {
        non_empty(&self.config.key).is_some() && non_empty(&self.config.kind).is_some()
    }

    #[instrument(skip_all)]
    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError> {
        let (Some(key), Some(kind)) = (non_empty(&self.config.key), non_empty(&self.config.kind))
        else {
            return Err(SendError::configuration("qmsg key or type is not set"));
        };
        let base = non_empty(&self.config.url).unwrap_or(DEFAULT_URL);
        // Qmsg swallows long dash runs, so they are collapsed.
        let msg = format!("{}\n\n{}", title, content.replace("----", "-"));
        let response = self
            .client
            .post(format!("{}/{}/{}", base.trim_end_matches('/'), kind, key))
            .query(&[("msg", msg.as_str())])
            .send()
            .await?;
        let body = read_json(response).await?;

        if json_i64(&body, "code") == Some(0) {
            Ok(ChannelResult::success(self.name(), "message sent"))
        } else {
            Ok(ChannelResult::failure(
                self.name(),
                "message rejected",
                json_message(&body, &["reason"]),
            ))
        }
    }
}
