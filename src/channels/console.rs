//! Prints notifications to the terminal.

use crate::config::ConsoleConfig;
use crate::core::{ChannelAdapter, ChannelResult, SendError};
use async_trait::async_trait;

pub struct ConsoleChannel {
    config: ConsoleConfig,
}

impl ConsoleChannel {
    pub fn new(config: ConsoleConfig) -> Self {
        Self { config }
    }

    fn render(title: &str, content: &str) -> String {
        format!("{}\n\n{}", title, content)
    }
}

#[async_trait]
impl ChannelAdapter for ConsoleChannel {
    fn name(&self) -> &str {
        "Console"
    }

    fn is_configured(&self) -> bool {
        self.config.enabled
    }

    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError> {
        let text = Self::render(title, content);
        if self.config.stderr {
            eprintln!("{}", text);
            Ok(ChannelResult::success(self.name(), "printed to stderr"))
        } else {
            println!("{}", text);
            Ok(ChannelResult::success(self.name(), "printed to console"))
        }
    }
}
