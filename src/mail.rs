use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::SmtpConfig;

/// A plain-text message addressed to one or more recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub subject: String,
    pub body: String,
    pub from: String,
    pub to: Vec<String>,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("smtp transport error: {0}")]
    Transport(String),

    #[error("mail delivery timed out")]
    Timeout,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    timeout: Duration,
}

impl SmtpMailer {
    pub fn from_config(cfg: &SmtpConfig, host: &str) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(cfg.timeout_secs);
        let builder = if cfg.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        } else {
            // Local catchers (Mailpit, MailHog) speak plain SMTP.
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        let mut builder = builder.port(cfg.port).timeout(Some(timeout));
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            transport: builder.build(),
            timeout,
        })
    }

    fn build_message(mail: &Mail) -> Result<Message, MailError> {
        if mail.to.is_empty() {
            return Err(MailError::InvalidAddress("no recipients".into()));
        }
        let from: Mailbox = mail
            .from
            .parse()
            .map_err(|_| MailError::InvalidAddress(mail.from.clone()))?;
        let mut builder = Message::builder()
            .from(from)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        for to in &mail.to {
            let mailbox: Mailbox = to
                .parse()
                .map_err(|_| MailError::InvalidAddress(to.clone()))?;
            builder = builder.to(mailbox);
        }
        builder
            .body(mail.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        let message = Self::build_message(&mail)?;
        let sent = tokio::time::timeout(self.timeout, self.transport.send(message))
            .await
            .map_err(|_| MailError::Timeout)?;
        sent.map_err(|e| MailError::Transport(e.to_string()))?;
        debug!(to = ?mail.to, subject = %mail.subject, "mail sent");
        Ok(())
    }
}

/// Writes outgoing mail to the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        SmtpMailer::build_message(&mail)?;
        info!(
            from = %mail.from,
            to = ?mail.to,
            subject = %mail.subject,
            body = %mail.body,
            "mail (console backend)"
        );
        Ok(())
    }
}
