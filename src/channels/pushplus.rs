//! PushPlus (WeChat) push.
//!
//! The current API lives at www.pushplus.plus. Accounts registered on the old
//! hxtrip domain only work there, so a rejection from the new API is retried
//! once against the old one.

use super::{json_i64, json_message, non_empty, read_json};
use crate::config::PushPlusConfig;
use crate::core::{ChannelAdapter, ChannelResult, SendError};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{instrument, warn};

const DEFAULT_URL: &str = "http://www.pushplus.plus/send";
const LEGACY_URL: &str = "http://pushplus.hxtrip.com/send";

pub struct PushPlusChannel {
    config: PushPlusConfig,
    client: reqwest::Client,
}

impl PushPlusChannel {
    pub fn new(config: PushPlusConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    async fn post(&self, url: &str, payload: &Value) -> Result<Value, SendError> {
        read_json(self.client.post(url).json(payload).send().await?).await
    }
}

#[async_trait]
impl ChannelAdapter for PushPlusChannel {
    fn name(&self) -> &str {
        "PushPlus"
    }

    fn is_configured(&self) -> bool {
        non_empty(&self.config.token).is_some()
    }

    #[instrument(skip_all)]
    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError> {
        let token = non_empty(&self.config.token)
            .ok_or_else(|| SendError::configuration("pushplus token is not set"))?;
        let payload = json!({
            "token": token,
            "title": title,
            "content": content,
            "topic": non_empty(&self.config.topic).unwrap_or_default(),
        });

        let body = match non_empty(&self.config.url) {
            // An explicit endpoint is used as-is.
            Some(url) => self.post(url, &payload).await?,
            None => {
                let body = self.post(DEFAULT_URL, &payload).await?;
                if json_i64(&body, "code") == Some(200) {
                    body
                } else {
                    warn!(
                        error = %json_message(&body, &["msg"]),
                        "PushPlus rejected the message, trying the legacy endpoint"
                    );
                    self.post(LEGACY_URL, &payload).await?
                }
            }
        };

        if json_i64(&body, "code") == Some(200) {
            Ok(ChannelResult::success(self.name(), "message queued"))
        } else {
            Ok(ChannelResult::failure(
                self.name(),
                "message rejected",
                json_message(&body, &["msg"]),
            ))
        }
    }
}
