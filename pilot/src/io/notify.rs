//! Outbound notification channel and contact resolution.

use anyhow::{Context, Result, anyhow};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::io::config::{ContactConfig, SmtpConfig};

/// Subject line used for every alert message.
pub const ALERT_SUBJECT: &str = "Companion robot alert";

/// One-way notification channel. Errors surface as leaf failures.
pub trait Notifier: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP-backed notifier.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn from_config(cfg: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = cfg
            .from
            .parse()
            .with_context(|| format!("parse smtp.from address '{}'", cfg.from))?;
        let mut builder = if cfg.tls {
            SmtpTransport::relay(&cfg.host)
                .with_context(|| format!("smtp relay to {}", cfg.host))?
        } else {
            SmtpTransport::builder_dangerous(&cfg.host)
        };
        builder = builder.port(cfg.port);
        if !cfg.username.is_empty() {
            builder =
                builder.credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()));
        }
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let recipient: Mailbox = to
            .parse()
            .with_context(|| format!("parse recipient address '{to}'"))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .body(body.to_string())
            .context("build message")?;
        self.transport
            .send(&email)
            .with_context(|| format!("send notification to '{to}'"))?;
        info!(subject, "notification sent");
        Ok(())
    }
}

/// Resolve a contact name, honoring the `emergency` alias.
pub fn resolve_name<'a>(contacts: &'a ContactConfig, contact: &'a str) -> &'a str {
    if contact == "emergency" {
        &contacts.emergency
    } else {
        contact
    }
}

/// Resolve a contact to its notification address via the contact book.
pub fn resolve_address(contacts: &ContactConfig, contact: &str) -> Result<String> {
    let name = resolve_name(contacts, contact);
    contacts
        .book
        .get(name)
        .cloned()
        .ok_or_else(|| anyhow!("no address on record for contact '{name}'"))
}
