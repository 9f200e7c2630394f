//! End-of-run notifications.
//!
//! Exactly one notification is sent per run. Delivery goes through a
//! [`Notifier`]; [`SmtpNotifier`] relays mail over STARTTLS, [`LogNotifier`]
//! only writes the message to the log when no relay is configured.

use crate::config::NotificationConfig;
use crate::error::NotificationError;
use crate::Result;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tracing::{debug, info};

/// Which fixed subject a notification carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// The run processed the whole inventory
    Completed,
    /// The run aborted
    Failed,
}

impl NotificationKind {
    fn suffix(&self) -> &'static str {
        match self {
            NotificationKind::Completed => "Completed",
            NotificationKind::Failed => "Failed",
        }
    }
}

/// An outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Build a notification whose subject is `"<prefix> <kind>"`.
    pub fn new(kind: NotificationKind, subject_prefix: &str, body: impl Into<String>) -> Self {
        let subject = if subject_prefix.is_empty() {
            kind.suffix().to_string()
        } else {
            format!("{} {}", subject_prefix, kind.suffix())
        };
        Self {
            kind,
            subject,
            body: body.into(),
        }
    }
}

/// Delivers notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one notification.
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            subject = %notification.subject,
            body = %notification.body,
            "Notification (no mail relay configured)"
        );
        Ok(())
    }
}

/// Sends plain-text mail through an SMTP relay with STARTTLS.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    to: String,
}

impl SmtpNotifier {
    /// Build a notifier from configuration.
    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        let (Some(server), Some(from), Some(to)) = (
            config.smtp_server.as_deref(),
            config.email_from.as_deref(),
            config.email_to.as_deref(),
        ) else {
            return Err(crate::Error::Config(
                "SMTP notifier requires smtp_server, email_from and email_to".into(),
            ));
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)
            .map_err(|e| NotificationError::Transport(e.to_string()))?
            .port(config.smtp_port);
        if let (Some(user), Some(password)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message> {
        let from = self
            .from
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::InvalidAddress {
                address: self.from.clone(),
                message: e.to_string(),
            })?;
        let to = self
            .to
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::InvalidAddress {
                address: self.to.clone(),
                message: e.to_string(),
            })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|e| NotificationError::Build(e.to_string()))?;
        Ok(message)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let message = self.build_message(notification)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        debug!(subject = %notification.subject, to = %self.to, "Notification sent");
        Ok(())
    }
}

/// Pick the notifier the configuration asks for.
pub fn notifier_from_config(config: &NotificationConfig) -> Result<Arc<dyn Notifier>> {
    if config.smtp_enabled() {
        Ok(Arc::new(SmtpNotifier::from_config(config)?))
    } else {
        Ok(Arc::new(LogNotifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config() -> NotificationConfig {
        NotificationConfig {
            email_from: Some("pgvac@example.com".into()),
            email_to: Some("dba@example.com".into()),
            smtp_server: Some("smtp.example.com".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_subjects() {
        let n = Notification::new(NotificationKind::Completed, "Vacuum/Analyze", "ok");
        assert_eq!(n.subject, "Vacuum/Analyze Completed");

        let n = Notification::new(NotificationKind::Failed, "Vacuum/Analyze", "boom");
        assert_eq!(n.subject, "Vacuum/Analyze Failed");

        let n = Notification::new(NotificationKind::Failed, "", "boom");
        assert_eq!(n.subject, "Failed");
    }

    #[tokio::test]
    async fn test_log_notifier() {
        let n = Notification::new(NotificationKind::Completed, "x", "body");
        assert!(LogNotifier.send(&n).await.is_ok());
    }

    #[test]
    fn test_smtp_requires_addresses() {
        let config = NotificationConfig {
            smtp_server: Some("smtp.example.com".into()),
            ..Default::default()
        };
        assert!(SmtpNotifier::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_build_message() {
        let notifier = SmtpNotifier::from_config(&smtp_config()).unwrap();
        let n = Notification::new(
            NotificationKind::Completed,
            "Vacuum/Analyze",
            "Processing complete. Success: 2, Failures: 0",
        );
        let message = notifier.build_message(&n).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Vacuum/Analyze Completed"));
        assert!(raw.contains("Processing complete. Success: 2, Failures: 0"));
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let config = NotificationConfig {
            email_from: Some("not an address".into()),
            ..smtp_config()
        };
        let notifier = SmtpNotifier::from_config(&config).unwrap();
        let n = Notification::new(NotificationKind::Failed, "x", "y");
        let err = notifier.build_message(&n).unwrap_err();
        assert!(err.to_string().contains("Invalid address"));
    }

    #[test]
    fn test_notifier_selection() {
        assert!(notifier_from_config(&NotificationConfig::default()).is_ok());
    }
}
