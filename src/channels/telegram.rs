//! Telegram bot messages, optionally through an HTTP proxy.

use super::{http_client_builder, json_message, non_empty, read_json};
use crate::config::TelegramConfig;
use crate::core::{ChannelAdapter, ChannelResult, SendError};
use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

const DEFAULT_API_HOST: &str = "api.telegram.org";

pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self, reqwest::Error> {
        let mut builder = http_client_builder();
        if let Some(proxy) = proxy_url(&config) {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(Self {
            config,
            client: builder.build()?,
        })
    }

    fn endpoint(&self, token: &str) -> String {
        let host = non_empty(&self.config.api_host).unwrap_or(DEFAULT_API_HOST);
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host)
        };
        format!("{}/bot{}/sendMessage", base, token)
    }
}

/// `http://[auth@]host:port` when both host and port are set.
fn proxy_url(config: &TelegramConfig) -> Option<String> {
    let host = non_empty(&config.proxy_host)?;
    let port = non_empty(&config.proxy_port)?;
    Some(match non_empty(&config.proxy_auth) {
        Some(auth) => format!("http://{}@{}:{}", auth, host, port),
        None => format!("http://{}:{}", host, port),
    })
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "Telegram"
    }

    fn is_configured(&self) -> bool {
        non_empty(&self.config.bot_token).is_some() && non_empty(&self.config.user_id).is_some()
    }

    #[instrument(skip_all)]
    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError> {
        let (Some(token), Some(chat_id)) = (
            non_empty(&self.config.bot_token),
            non_empty(&self.config.user_id),
        ) else {
            return Err(SendError::configuration("telegram bot token or user id is not set"));
        };

        let text = format!("{}\n\n{}", title, content);
        let response = self
            .client
            .post(self.endpoint(token))
            .form(&[
                ("chat_id", chat_id),
                ("text", text.as_str()),
                ("disable_web_page_preview", "true"),
            ])
            .send()
            .await?;
        let body = read_json(response).await?;

        if body.get("ok").and_then(Value::as_bool) == Some(true) {
            Ok(ChannelResult::success(self.name(), "message sent"))
        } else {
            Ok(ChannelResult::failure(
                self.name(),
                "message rejected",
                json_message(&body, &["description"]),
            ))
        }
    }
}
