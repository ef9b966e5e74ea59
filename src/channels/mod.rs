//! Built-in delivery channels.
//!
//! Every channel wraps one third-party push service behind [`ChannelAdapter`].
//! The set is closed: [`ChannelKind::ALL`] lists every channel and
//! [`build_channels`] constructs all of them from [`ChannelsConfig`], configured
//! or not. The dispatcher skips the ones that report `is_configured() == false`.

pub mod bark;
pub mod console;
pub mod dingtalk;
pub mod gotify;
pub mod igot;
pub mod pushdeer;
pub mod pushplus;
pub mod qmsg;
pub mod serverchan;
pub mod smtp;
pub mod telegram;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod wecom;

use crate::config::ChannelsConfig;
use crate::core::{ChannelAdapter, SendError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Per-request timeout for every HTTP channel.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// The closed set of channels notifan knows how to deliver to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Console,
    Bark,
    DingTalk,
    Gotify,
    Telegram,
    Smtp,
    PushPlus,
    ServerChan,
    WeComApp,
    WeComBot,
    PushDeer,
    Qmsg,
    IGot,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 13] = [
        ChannelKind::Console,
        ChannelKind::Bark,
        ChannelKind::DingTalk,
        ChannelKind::Gotify,
        ChannelKind::Telegram,
        ChannelKind::Smtp,
        ChannelKind::PushPlus,
        ChannelKind::ServerChan,
        ChannelKind::WeComApp,
        ChannelKind::WeComBot,
        ChannelKind::PushDeer,
        ChannelKind::Qmsg,
        ChannelKind::IGot,
    ];

    /// The adapter name, also used as the summary key.
    pub fn name(self) -> &'static str {
        match self {
            ChannelKind::Console => "Console",
            ChannelKind::Bark => "Bark",
            ChannelKind::DingTalk => "DingTalk",
            ChannelKind::Gotify => "Gotify",
            ChannelKind::Telegram => "Telegram",
            ChannelKind::Smtp => "SMTP",
            ChannelKind::PushPlus => "PushPlus",
            ChannelKind::ServerChan => "ServerChan",
            ChannelKind::WeComApp => "WeComApp",
            ChannelKind::WeComBot => "WeComBot",
            ChannelKind::PushDeer => "PushDeer",
            ChannelKind::Qmsg => "Qmsg",
            ChannelKind::IGot => "iGot",
        }
    }

    fn build(
        self,
        config: &ChannelsConfig,
        client: &reqwest::Client,
    ) -> Result<Arc<dyn ChannelAdapter>, reqwest::Error> {
        let client = client.clone();
        let adapter: Arc<dyn ChannelAdapter> = match self {
            ChannelKind::Console => Arc::new(console::ConsoleChannel::new(config.console.clone())),
            ChannelKind::Bark => Arc::new(bark::BarkChannel::new(config.bark.clone(), client)),
            ChannelKind::DingTalk => {
                Arc::new(dingtalk::DingTalkChannel::new(config.dingtalk.clone(), client))
            }
            ChannelKind::Gotify => {
                Arc::new(gotify::GotifyChannel::new(config.gotify.clone(), client))
            }
            // Telegram may route through its own proxy, so it builds its own client.
            ChannelKind::Telegram => {
                Arc::new(telegram::TelegramChannel::new(config.telegram.clone())?)
            }
            ChannelKind::Smtp => Arc::new(smtp::SmtpChannel::new(config.smtp.clone())),
            ChannelKind::PushPlus => {
                Arc::new(pushplus::PushPlusChannel::new(config.pushplus.clone(), client))
            }
            ChannelKind::ServerChan => Arc::new(serverchan::ServerChanChannel::new(
                config.serverchan.clone(),
                client,
            )),
            ChannelKind::WeComApp => {
                Arc::new(wecom::WeComAppChannel::new(config.wecom_app.clone(), client))
            }
            ChannelKind::WeComBot => {
                Arc::new(wecom::WeComBotChannel::new(config.wecom_bot.clone(), client))
            }
            ChannelKind::PushDeer => {
                Arc::new(pushdeer::PushDeerChannel::new(config.pushdeer.clone(), client))
            }
            ChannelKind::Qmsg => Arc::new(qmsg::QmsgChannel::new(config.qmsg.clone(), client)),
            ChannelKind::IGot => Arc::new(igot::IGotChannel::new(config.igot.clone(), client)),
        };
        Ok(adapter)
    }
}

/// Builds every built-in channel, in [`ChannelKind::ALL`] order.
pub fn build_channels(
    config: &ChannelsConfig,
) -> Result<Vec<Arc<dyn ChannelAdapter>>, reqwest::Error> {
    let client = http_client_builder().build()?;
    ChannelKind::ALL
        .iter()
        .map(|kind| kind.build(config, &client))
        .collect()
}

/// The client settings shared by all HTTP channels.
pub fn http_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("notifan/", env!("CARGO_PKG_VERSION")))
}

/// Returns the trimmed value if it is present and not blank.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Reads a JSON response body.
///
/// 5xx and 429 are reported as temporary errors before the body is looked at.
/// Other statuses are returned to the caller as long as the body is JSON, as
/// most services explain rejections in the body.
pub(crate) async fn read_json(response: reqwest::Response) -> Result<Value, SendError> {
    let status = response.status();
    if status.is_server_error() || status.as_u16() == 429 {
        return Err(SendError::temporary(format!("HTTP {}", status)));
    }
    let text = response.text().await?;
    match serde_json::from_str(&text) {
        Ok(body) => Ok(body),
        Err(_) if !status.is_success() => Err(SendError::permanent(format!(
            "HTTP {}: {}",
            status,
            truncate(&text, 200)
        ))),
        Err(e) => Err(SendError::permanent(format!("invalid JSON response: {}", e))),
    }
}

/// Reads an integer field that some services send as a string.
pub(crate) fn json_i64(body: &Value, key: &str) -> Option<i64> {
    match body.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The first present string field among `keys`, or a fallback.
pub(crate) fn json_message(body: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown error".to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
