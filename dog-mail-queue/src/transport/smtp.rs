//! SMTP transport built on `lettre`.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use super::{Delivery, MailTransport};
use crate::{EmailContent, QueueError, QueueResult, TransportError, TransportResult};

/// SMTP connection settings
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_email: String,
    pub from_name: String,
    /// Optional for local servers such as Mailpit
    pub username: Option<String>,
    pub password: Option<String>,
    /// `false` talks plain SMTP (local development only)
    pub use_tls: bool,
    /// Connection, greeting and socket timeout
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, port: u16, from_email: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            from_email: from_email.into(),
            from_name: String::new(),
            username: None,
            password: None,
            use_tls: false,
            timeout: Duration::from_secs(10),
        }
    }

    /// Read `SMTP_*` variables
    pub fn from_env() -> QueueResult<Self> {
        let port = match std::env::var("SMTP_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| QueueError::InvalidConfig(format!("SMTP_PORT: invalid port '{raw}'")))?,
            Err(_) => 1025,
        };

        Ok(Self {
            host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port,
            from_email: std::env::var("SMTP_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@localhost".to_string()),
            from_name: std::env::var("SMTP_FROM_NAME").unwrap_or_default(),
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            use_tls: std::env::var("SMTP_USE_TLS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            timeout: Duration::from_secs(10),
        })
    }

    /// Set the sender display name
    pub fn with_from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = name.into();
        self
    }

    /// Set TLS
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Set credentials
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Delivers mail through an SMTP relay
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    config: SmtpConfig,
}

impl SmtpTransport {
    pub fn new(config: SmtpConfig) -> QueueResult<Self> {
        let from = sender_mailbox(&config)?;
        let transport = build_transport(&config)?;
        info!(host = %config.host, port = config.port, tls = config.use_tls, "SMTP transport ready");

        Ok(Self {
            transport,
            from,
            config,
        })
    }
}

fn sender_mailbox(config: &SmtpConfig) -> QueueResult<Mailbox> {
    let raw = if config.from_name.is_empty() {
        config.from_email.clone()
    } else {
        format!("{} <{}>", config.from_name, config.from_email)
    };
    raw.parse()
        .map_err(|e| QueueError::InvalidConfig(format!("Invalid from address '{raw}': {e}")))
}

fn build_transport(config: &SmtpConfig) -> QueueResult<AsyncSmtpTransport<Tokio1Executor>> {
    let mut builder = if config.use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| QueueError::InvalidConfig(format!("Failed to create SMTP relay: {e}")))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
    };

    builder = builder.port(config.port).timeout(Some(config.timeout));

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }

    Ok(builder.build())
}

/// Build a multipart/alternative message with text and HTML parts
pub fn build_message(from: &Mailbox, email: &EmailContent) -> TransportResult<Message> {
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e| TransportError::InvalidMessage(format!("Invalid recipient '{}': {}", email.to, e)))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(&email.subject)
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(email.text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(email.html.clone()),
                ),
        )
        .map_err(|e| TransportError::InvalidMessage(e.to_string()))
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, email: &EmailContent) -> TransportResult<Delivery> {
        let message = build_message(&self.from, email)?;

        debug!(to = %email.to, host = %self.config.host, "Sending email via SMTP");

        let response = self.transport.send(message).await.map_err(|e| {
            if e.is_permanent() {
                TransportError::rejected(e.to_string())
            } else {
                TransportError::connection(e.to_string())
            }
        })?;

        let message_id = response.message().next().map(|s| s.to_string());
        Ok(Delivery { message_id })
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
