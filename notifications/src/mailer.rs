//! Mail transports.
//!
//! - [`SmtpMailer`]: lettre's async SMTP transport (MailHog in development,
//!   a relay with credentials in production)
//! - [`ConsoleMailer`]: logs mails instead of sending them
//! - [`MockMailer`]: records mails for tests

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// One outgoing mail to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub text: String,
    /// HTML body
    pub html: String,
}

/// Mail delivery failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    /// An address could not be parsed.
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress {
        /// The offending address
        address: String,
        /// Parser message
        reason: String,
    },

    /// The message could not be assembled.
    #[error("Failed to build message: {0}")]
    Build(String),

    /// The SMTP exchange failed.
    #[error("SMTP error: {0}")]
    Transport(String),
}

/// Sends mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver `mail`.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] if the mail could not be handed to the transport.
    async fn send(&self, mail: &Mail) -> Result<(), MailError>;
}

/// SMTP settings.
#[derive(Clone)]
pub struct SmtpConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Username; empty for unauthenticated servers such as MailHog
    pub username: String,
    /// Password
    pub password: String,
    /// `From` address
    pub sender: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sender", &self.sender)
            .finish()
    }
}

/// SMTP mailer using lettre's tokio transport.
///
/// ```ignore
/// let mailer = SmtpMailer::new(&SmtpConfig {
///     host: "localhost".to_string(),
///     port: 1025,
///     username: String::new(),
///     password: String::new(),
///     sender: "giu-event-hub@giu-uni.de".to_string(),
/// })?;
/// ```
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    /// Build the transport.
    ///
    /// Without a username the connection is plain SMTP on `port`; with one it
    /// is a TLS relay using the credentials.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] if the sender address or relay host is invalid.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let sender = parse_mailbox(&config.sender)?;

        let transport = if config.username.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?
                .port(config.port)
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .build()
        };

        tracing::info!(host = %config.host, port = config.port, "SMTP mailer configured");
        Ok(Self { transport, sender })
    }

    fn build_message(&self, mail: &Mail) -> Result<Message, MailError> {
        Message::builder()
            .from(self.sender.clone())
            .to(parse_mailbox(&mail.to)?)
            .subject(mail.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                mail.text.clone(),
                mail.html.clone(),
            ))
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        let message = self.build_message(mail)?;
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| MailError::Transport(e.to_string()))
    }
}

/// Logs mails instead of sending them.
#[derive(Clone, Debug, Default)]
pub struct ConsoleMailer;

impl ConsoleMailer {
    /// Create a console mailer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.text,
            "Mail (console mode, not sent)"
        );
        Ok(())
    }
}

/// Records mails for assertions.
#[derive(Clone, Debug, Default)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<Mail>>>,
    failing: Arc<Mutex<Vec<String>>>,
}

impl MockMailer {
    /// Mailer that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mails accepted so far, in send order.
    #[must_use]
    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Recipients of the accepted mails, sorted.
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        let mut to: Vec<String> = self.sent().into_iter().map(|m| m.to).collect();
        to.sort();
        to
    }

    /// Reject every mail addressed to `address`.
    pub fn fail_for(&self, address: impl Into<String>) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.push(address.into());
        }
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        let rejected = self
            .failing
            .lock()
            .map(|failing| failing.contains(&mail.to))
            .unwrap_or(false);
        if rejected {
            return Err(MailError::Transport(format!("mock rejects {}", mail.to)));
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail.clone());
        }
        Ok(())
    }
}
