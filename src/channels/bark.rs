//! Bark iOS push.

use super::{json_i64, json_message, non_empty, read_json};
use crate::config::BarkConfig;
use crate::core::{ChannelAdapter, ChannelResult, SendError};
use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, instrument};

const DEFAULT_SERVER: &str = "https://api.day.app";

pub struct BarkChannel {
    config: BarkConfig,
    client: reqwest::Client,
}

impl BarkChannel {
    pub fn new(config: BarkConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// `push` is either a bare device key or a full `https://host/key` URL.
    fn endpoint(&self, title: &str, content: &str) -> Result<Url, SendError> {
        let push = non_empty(&self.config.push)
            .ok_or_else(|| SendError::configuration("bark push key is not set"))?;
        let base = if push.starts_with("http") {
            push.trim_end_matches('/').to_string()
        } else {
            format!("{}/{}", DEFAULT_SERVER, push)
        };

        let mut url = Url::parse(&base)
            .map_err(|e| SendError::configuration(format!("invalid bark url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| SendError::configuration(format!("invalid bark url: {}", base)))?
            .push(title)
            .push(content);

        {
            let mut query = url.query_pairs_mut();
            let options = [
                ("isArchive", &self.config.archive),
                ("group", &self.config.group),
                ("sound", &self.config.sound),
                ("icon", &self.config.icon),
            ];
            for (key, value) in options {
                if let Some(value) = non_empty(value) {
                    query.append_pair(key, value);
                }
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }
}

#[async_trait]
impl ChannelAdapter for BarkChannel {
    fn name(&self) -> &str {
        "Bark"
    }

    fn is_configured(&self) -> bool {
        non_empty(&self.config.push).is_some()
    }

    #[instrument(skip_all)]
    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError> {
        let url = self.endpoint(title, content)?;
        debug!(host = url.host_str().unwrap_or_default(), "Sending to Bark");
        let body = read_json(self.client.get(url).send().await?).await?;

        if json_i64(&body, "code") == Some(200) {
            Ok(ChannelResult::success(self.name(), "pushed"))
        } else {
            Ok(ChannelResult::failure(
                self.name(),
                "push rejected",
                json_message(&body, &["message"]),
            ))
        }
    }
}
