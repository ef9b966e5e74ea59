//! The notification service: configured channels plus a dispatcher.

use crate::channels::{build_channels, http_client_builder};
use crate::config::Config;
use crate::core::{ChannelAdapter, NotificationRequest};
use crate::dispatcher::Dispatcher;
use crate::event::EventPayload;
use crate::hitokoto;
use crate::summary::DispatchSummary;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, instrument};

pub struct NotificationService {
    config: Config,
    dispatcher: Dispatcher,
    adapters: Vec<Arc<dyn ChannelAdapter>>,
    http: reqwest::Client,
}

impl NotificationService {
    /// Validates `config` and builds every built-in channel from it.
    pub fn from_config(config: Config) -> Result<Self> {
        let adapters = build_channels(&config.channels)?;
        Self::with_adapters(config, adapters)
    }

    /// Uses the given adapters instead of the built-in channels.
    pub fn with_adapters(config: Config, adapters: Vec<Arc<dyn ChannelAdapter>>) -> Result<Self> {
        config.validate()?;
        let dispatcher = Dispatcher::new(config.dispatch.clone())?;
        Ok(Self {
            config,
            dispatcher,
            adapters,
            http: http_client_builder().build()?,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Every adapter, configured or not.
    pub fn channels(&self) -> &[Arc<dyn ChannelAdapter>] {
        &self.adapters
    }

    /// Names of the channels a dispatch would select.
    pub fn active_channels(&self) -> Vec<&str> {
        self.adapters
            .iter()
            .filter(|a| a.is_configured())
            .map(|a| a.name())
            .collect()
    }

    /// Sends one notification to every configured channel.
    #[instrument(skip_all, fields(title = %request.title, source = %request.source))]
    pub async fn send(&self, request: &NotificationRequest) -> DispatchSummary {
        info!("Sending notification");
        // No quote for a message the dispatcher is going to skip anyway.
        if self.config.hitokoto.enabled
            && !request.content.is_empty()
            && !self.config.dispatch.is_skipped_title(&request.title)
        {
            let quoted = NotificationRequest {
                content: hitokoto::with_quote(&self.http, &self.config.hitokoto, &request.content)
                    .await,
                ..request.clone()
            };
            return self.dispatcher.dispatch_request(&quoted, &self.adapters).await;
        }
        self.dispatcher.dispatch_request(request, &self.adapters).await
    }

    /// Validates a `repository_dispatch` event and sends its notification.
    pub async fn process_event(&self, event: EventPayload) -> Result<DispatchSummary> {
        event.log_details();
        event.validate()?;
        let request = event.into_request();
        info!(source = %request.source, title = %request.title, "Received notification request");
        Ok(self.send(&request).await)
    }
}
