//! Plain-text mail through an SMTP server, sent from the account to itself.

use super::{non_empty, HTTP_TIMEOUT};
use crate::config::SmtpConfig;
use crate::core::{ChannelAdapter, ChannelResult, SendError};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::instrument;

const SSL_PORT: u16 = 465;
const PLAIN_PORT: u16 = 25;

pub struct SmtpChannel {
    config: SmtpConfig,
}

impl SmtpChannel {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Splits `host[:port]`, defaulting the port from the TLS mode.
    fn address(&self, server: &str) -> Result<(String, u16), SendError> {
        let default_port = if self.config.ssl { SSL_PORT } else { PLAIN_PORT };
        match server.rsplit_once(':') {
            None => Ok((server.to_string(), default_port)),
            Some((host, port)) => port
                .parse()
                .map(|port| (host.to_string(), port))
                .map_err(|_| SendError::configuration(format!("invalid smtp port '{}'", port))),
        }
    }

    fn message(
        &self,
        email: &str,
        name: &str,
        title: &str,
        content: &str,
    ) -> Result<Message, SendError> {
        let address = email
            .parse::<Address>()
            .map_err(|e| SendError::configuration(format!("invalid smtp email: {}", e)))?;
        let mailbox = Mailbox::new(Some(name.to_string()), address);
        Message::builder()
            .from(mailbox.clone())
            .to(mailbox)
            .subject(title)
            .header(ContentType::TEXT_PLAIN)
            .body(content.to_string())
            .map_err(|e| SendError::configuration(format!("invalid mail: {}", e)))
    }
}

impl From<lettre::transport::smtp::Error> for SendError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        if err.is_permanent() {
            SendError::permanent(err.to_string())
        } else if err.is_transient() {
            SendError::temporary(err.to_string())
        } else if err.is_timeout() {
            SendError::timeout(err.to_string())
        } else {
            SendError::network(err.to_string())
        }
    }
}

#[async_trait]
impl ChannelAdapter for SmtpChannel {
    fn name(&self) -> &str {
        "SMTP"
    }

    fn is_configured(&self) -> bool {
        non_empty(&self.config.server).is_some()
            && non_empty(&self.config.email).is_some()
            && non_empty(&self.config.password).is_some()
            && non_empty(&self.config.name).is_some()
    }

    #[instrument(skip_all)]
    async fn send(&self, title: &str, content: &str) -> Result<ChannelResult, SendError> {
        let (Some(server), Some(email), Some(password), Some(name)) = (
            non_empty(&self.config.server),
            non_empty(&self.config.email),
            non_empty(&self.config.password),
            non_empty(&self.config.name),
        ) else {
            return Err(SendError::configuration("smtp settings are incomplete"));
        };

        let (host, port) = self.address(server)?;
        let message = self.message(email, name, title, content)?;
        let builder = if self.config.ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&host)
        };
        let mailer = builder
            .port(port)
            .credentials(Credentials::new(email.to_string(), password.to_string()))
            .timeout(Some(HTTP_TIMEOUT))
            .build();

        let response = mailer.send(message).await?;
        if response.is_positive() {
            Ok(ChannelResult::success(self.name(), "mail sent"))
        } else {
            Ok(ChannelResult::failure(
                self.name(),
                "mail rejected",
                format!("SMTP {}", response.code()),
            ))
        }
    }
}
