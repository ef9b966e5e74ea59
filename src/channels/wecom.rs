//! WeCom (企业微信): the group robot webhook and application messages.

use super::{json_i64, json_message, non_empty, read_json};
use crate::config::{WeComAppConfig, WeComBotConfig};
use crate::core::{ChannelAdapter, ChannelResult, SendError};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

const DEFAULT_URL: &str = "https://qyapi.weixin.qq.com/cgi-bin/webhook/send";
const DEFAULT_API: &str = "https://qyapi.weixin.qq.com/cgi-bin";

pub struct WeComBotChannel {
    config: WeComBotConfig,
    client: reqwest::Client,
}

impl WeComBotChannel {
    pub fn new(config: WeComBotConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl ChannelAdapter for WeComBotChannel {
    fn name(&self) -> &str {
        "WeComBot"
    }

    fn is_configured(&self) -> bool {
        non_empty(&self.config.key).is_some()
    }

    #[instrument(skip_all)]
    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError> {
        let key = non_empty(&self.config.key)
            .ok_or_else(|| SendError::configuration("wecom bot key is not set"))?;
        let url = non_empty(&self.config.url).unwrap_or(DEFAULT_URL);
        let payload = json!({
            "msgtype": "text",
            "text": { "content": format!("{}\n\n{}", title, content) },
        });
        let response = self
            .client
            .post(url)
            .query(&[("key", key)])
            .json(&payload)
            .send()
            .await?;
        let body = read_json(response).await?;

        if json_i64(&body, "errcode") == Some(0) {
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

/// Sends through a WeCom application. An access token is fetched from
/// `gettoken` before each message.
pub struct WeComAppChannel {
    config: WeComAppConfig,
    client: reqwest::Client,
}

impl WeComAppChannel {
    pub fn new(config: WeComAppConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn api(&self) -> &str {
        non_empty(&self.config.url)
            .unwrap_or(DEFAULT_API)
            .trim_end_matches('/')
    }

    /// Text messages by default, mpnews when a thumbnail media id is set.
    fn message(&self, agent_id: &str, title: &str, content: &str) -> Value {
        let to_user = non_empty(&self.config.to_user).unwrap_or("@all");
        match non_empty(&self.config.media_id) {
            None => json!({
                "touser": to_user,
                "msgtype": "text",
                "agentid": agent_id,
                "text": { "content": format!("{}\n\n{}", title, content) },
                "safe": "0",
            }),
            Some(media_id) => json!({
                "touser": to_user,
                "msgtype": "mpnews",
                "agentid": agent_id,
                "mpnews": {
                    "articles": [{
                        "title": title,
                        "thumb_media_id": media_id,
                        "author": "notifan",
                        "content_source_url": "",
                        "content": content.replace('\n', "<br/>"),
                        "digest": content,
                    }]
                },
            }),
        }
    }
}

#[async_trait]
impl ChannelAdapter for WeComAppChannel {
    fn name(&self) -> &str {
        "WeComApp"
    }

    fn is_configured(&self) -> bool {
        non_empty(&self.config.corp_id).is_some()
            && non_empty(&self.config.corp_secret).is_some()
            && non_empty(&self.config.agent_id).is_some()
    }

    #[instrument(skip_all)]
    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError> {
        let (Some(corp_id), Some(corp_secret), Some(agent_id)) = (
            non_empty(&self.config.corp_id),
            non_empty(&self.config.corp_secret),
            non_empty(&self.config.agent_id),
        ) else {
            return Err(SendError::configuration(
                "wecom app corp_id, corp_secret or agent_id is not set",
            ));
        };

        let response = self
            .client
            .get(format!("{}/gettoken", self.api()))
            .query(&[("corpid", corp_id), ("corpsecret", corp_secret)])
            .send()
            .await?;
        let body = read_json(response).await?;
        let Some(token) = body.get("access_token").and_then(Value::as_str) else {
            return Ok(ChannelResult::failure(
                self.name(),
                "access token request rejected",
                json_message(&body, &["errmsg"]),
            ));
        };
        debug!("Fetched wecom access token");

        let response = self
            .client
            .post(format!("{}/message/send", self.api()))
            .query(&[("access_token", token)])
            .json(&self.message(agent_id, title, content))
            .send()
            .await?;
        let body = read_json(response).await?;

        if json_i64(&body, "errcode") == Some(0) {
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
