//! Event notification emails over an authenticated SMTP relay.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::env;
use tracing::{info, warn};

use crate::events::Event;
use crate::{Error, Result};

pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const FALLBACK_FROM: &str = "no-reply@example.com";
const PLACEHOLDER: &str = "-";

/// SMTP relay settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl SmtpConfig {
    /// Load from `SMTP_*` / `EMAIL_FROM`. `None` when host or credentials are missing.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = non_empty("SMTP_HOST")?;
        let username = non_empty("SMTP_USERNAME")?;
        let password = non_empty("SMTP_PASSWORD")?;

        let port = match non_empty("SMTP_PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid SMTP_PORT, using {}", DEFAULT_SMTP_PORT);
                DEFAULT_SMTP_PORT
            }),
            None => DEFAULT_SMTP_PORT,
        };

        let from = non_empty("EMAIL_FROM").unwrap_or_else(|| username.clone());

        Some(Self {
            host,
            port,
            username,
            password,
            from,
        })
    }
}

/// Delivers the notification for one event.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &Event) -> Result<()>;
}

/// Plain-text body of the event notification.
pub fn render_body(event: &Event) -> String {
    [
        "Hi,".to_string(),
        String::new(),
        "An event has been created in your AI Summariser offline calendar:".to_string(),
        String::new(),
        format!("Title       : {}", event.title),
        format!("Date & Time : {}", event.start_time.to_rfc3339()),
        format!("Location    : {}", or_placeholder(event.location.as_deref())),
        String::new(),
        format!("Description : {}", or_placeholder(event.description.as_deref())),
        String::new(),
        "This email was sent from your AI Summariser backend.".to_string(),
    ]
    .join("\n")
}

fn or_placeholder(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(PLACEHOLDER)
}

/// Build the notification message for an event with a notify address.
pub fn compose(event: &Event, from: &str) -> Result<Message> {
    let to = event
        .notify_address()
        .ok_or_else(|| Error::Mail(format!("Event {} has no notify_email", event.id)))?;

    let from = from
        .parse::<Mailbox>()
        .or_else(|_| FALLBACK_FROM.parse::<Mailbox>())
        .map_err(|e| Error::Mail(format!("Invalid sender address: {}", e)))?;
    let to = to
        .parse::<Mailbox>()
        .map_err(|e| Error::Mail(format!("Invalid recipient address {}: {}", to, e)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(format!("Event created: {}", event.title))
        .header(ContentType::TEXT_PLAIN)
        .body(render_body(event))
        .map_err(|e| Error::Mail(format!("Failed to build message: {}", e)))
}

/// Sends through STARTTLS with credentials. Skips when unconfigured.
pub struct SmtpNotifier {
    config: Option<SmtpConfig>,
}

impl SmtpNotifier {
    pub fn new(config: Option<SmtpConfig>) -> Self {
        if config.is_none() {
            warn!("SMTP not configured, event emails will be skipped");
        }
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(SmtpConfig::from_env())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, event: &Event) -> Result<()> {
        if event.notify_address().is_none() {
            return Ok(());
        }

        let Some(config) = &self.config else {
            info!(event_id = event.id, "SMTP not configured, skipping email send");
            return Ok(());
        };

        let message = compose(event, &config.from)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| Error::Mail(format!("Failed to set up SMTP relay: {}", e)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        transport
            .send(message)
            .await
            .map_err(|e| Error::Mail(format!("Failed to send email: {}", e)))?;

        info!(event_id = event.id, "Event email sent");
        Ok(())
    }
}
