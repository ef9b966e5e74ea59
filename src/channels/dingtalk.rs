//! DingTalk (钉钉) group robot with signed requests.
//!
//! Each request carries the current time in milliseconds and
//! `base64(hmac_sha256(secret, "{timestamp}\n{secret}"))` as `sign`.

use super::{json_i64, json_message, non_empty, read_json};
use crate::config::DingTalkConfig;
use crate::core::{ChannelAdapter, ChannelResult, SendError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::instrument;

const DEFAULT_URL: &str = "https://oapi.dingtalk.com/robot/send";

type HmacSha256 = Hmac<Sha256>;

pub struct DingTalkChannel {
    config: DingTalkConfig,
    client: reqwest::Client,
}

impl DingTalkChannel {
    pub fn new(config: DingTalkConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

/// The `sign` query value for `timestamp`, before URL encoding.
pub fn sign(secret: &str, timestamp: i64) -> Result<String, SendError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SendError::configuration(format!("dingtalk secret: {}", e)))?;
    mac.update(format!("{}\n{}", timestamp, secret).as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl ChannelAdapter for DingTalkChannel {
    fn name(&self) -> &str {
        "DingTalk"
    }

    fn is_configured(&self) -> bool {
        non_empty(&self.config.token).is_some() && non_empty(&self.config.secret).is_some()
    }

    #[instrument(skip_all)]
    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError> {
        let (Some(token), Some(secret)) =
            (non_empty(&self.config.token), non_empty(&self.config.secret))
        else {
            return Err(SendError::configuration("dingtalk token or secret is not set"));
        };

        let timestamp = chrono::Utc::now().timestamp_millis();
        let sign = sign(secret, timestamp)?;
        let timestamp = timestamp.to_string();
        let payload = json!({
            "msgtype": "text",
            "text": { "content": format!("{}\n\n{}", title, content) },
        });
        let response = self
            .client
            .post(non_empty(&self.config.url).unwrap_or(DEFAULT_URL))
            .query(&[
                ("access_token", token),
                ("timestamp", timestamp.as_str()),
                ("sign", sign.as_str()),
            ])
            .json(&payload)
            .send()
            .await?;
        let body = read_json(response).await?;

        // A missing errcode counts as success.
        if json_i64(&body, "errcode").unwrap_or(0) == 0 {
            Ok(ChannelResult::success(self.name(), "message sent"))
        } else {
            Ok(ChannelResult::failure(
                self.name(),
                "message rejected",
                json_message(&body, &["errmsg"]),
            ))
        }
    }
}
