//! Outgoing email. Delivery is best-effort: [`dispatch`] sends on a detached
//! task and only logs failures.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::config::AppConfig;
use crate::models::VerificationPurpose;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail API answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Writes messages to the log instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        log::info!(
            "Email to {} not sent (no mail API configured): {}",
            message.to,
            message.subject
        );
        Ok(())
    }
}

/// Posts messages to a transactional-mail HTTP API.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: Option<String>, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let mut request = self.client.post(&self.api_url).json(&json!({
            "from": self.from,
            "to": [message.to],
            "subject": message.subject,
            "html": message.html,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected { status, body });
        }
        Ok(())
    }
}

/// Picks the HTTP mailer when a mail API is configured.
pub fn from_config(config: &AppConfig) -> Arc<dyn Mailer> {
    match &config.mail_api_url {
        Some(url) if !url.is_empty() => Arc::new(HttpMailer::new(
            url.clone(),
            config.mail_api_key.clone(),
            config.mail_from.clone(),
        )),
        _ => Arc::new(LogMailer),
    }
}

/// Sends `message` in the background. Failures are logged and dropped.
pub fn dispatch(mailer: Arc<dyn Mailer>, message: EmailMessage) {
    tokio::spawn(async move {
        let to = message.to.clone();
        if let Err(e) = mailer.send(message).await {
            log::warn!("Failed to send email to {}: {}", to, e);
        }
    });
}

/// Escapes user-supplied text for the HTML bodies below.
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn verification_code(to: &str, code: &str, purpose: VerificationPurpose) -> EmailMessage {
    let (subject, intro) = match purpose {
        VerificationPurpose::Login => ("Your Basha Lagbe sign-in code", "Use this code to finish signing in."),
        VerificationPurpose::EmailChange => (
            "Confirm your new email address",
            "Use this code to confirm your new email address.",
        ),
        VerificationPurpose::PasswordReset => (
            "Reset your Basha Lagbe password",
            "Use this code to choose a new password.",
        ),
    };
    EmailMessage {
        to: to.to_string(),
        subject: subject.to_string(),
        html: format!(
            "<p>{}</p><h2>{}</h2><p>The code expires in 10 minutes. If you did not request it, ignore this email.</p>",
            intro,
            escape_html(code)
        ),
    }
}

pub fn welcome(to: &str, username: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Welcome to Basha Lagbe".to_string(),
        html: format!(
            "<p>Hi {},</p><p>Your account is ready. Start browsing rentals or list your own property.</p>",
            escape_html(username)
        ),
    }
}

pub fn inquiry_received(to: &str, listing: &str, sender: &str, body: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("New inquiry about {}", listing),
        html: format!(
            "<p>{} asked about <b>{}</b>:</p><blockquote>{}</blockquote>",
            escape_html(sender),
            escape_html(listing),
            escape_html(body)
        ),
    }
}

pub fn inquiry_replied(to: &str, listing: &str, reply: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Reply to your inquiry about {}", listing),
        html: format!(
            "<p>The owner of <b>{}</b> replied:</p><blockquote>{}</blockquote>",
            escape_html(listing),
            escape_html(reply)
        ),
    }
}

pub fn application_decided(to: &str, listing: &str, status: &str, note: Option<&str>) -> EmailMessage {
    let note = note
        .map(|n| format!("<p>Note from the owner: {}</p>", escape_html(n)))
        .unwrap_or_default();
    EmailMessage {
        to: to.to_string(),
        subject: format!("Your application for {} was {}", listing, status),
        html: format!(
            "<p>Your rental application for <b>{}</b> was {}.</p>{}",
            escape_html(listing),
            status,
            note
        ),
    }
}

pub fn listing_moderated(to: &str, listing: &str, status: &str, reason: Option<&str>) -> EmailMessage {
    let reason = reason
        .map(|r| format!("<p>Reason: {}</p>", escape_html(r)))
        .unwrap_or_default();
    EmailMessage {
        to: to.to_string(),
        subject: format!("Your listing {} is {}", listing, status),
        html: format!(
            "<p>Your listing <b>{}</b> is now {}.</p>{}",
            escape_html(listing),
            status,
            reason
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_email_carries_the_code() {
        let message = verification_code("a@b.com", "123456", VerificationPurpose::Login);
        assert_eq!(message.to, "a@b.com");
        assert!(message.html.contains("123456"));
    }

    #[test]
    fn user_text_is_escaped_in_html_bodies() {
        let message = inquiry_received(
            "owner@b.com",
            "Flat <b>2</b>",
            "Eve & co",
            "<script>alert('x')</script>",
        );
        assert!(!message.html.contains("<script>"));
        assert!(message.html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(message.html.contains("Eve &amp; co"));
        assert!(message.html.contains("Flat &lt;b&gt;2&lt;/b&gt;"));

        let message = listing_moderated("a@b.com", "Flat", "rejected", Some("\"quoted\""));
        assert!(message.html.contains("&quot;quoted&quot;"));
    }

    #[tokio::test]
    async fn log_mailer_is_picked_without_api_url() {
        let mailer = from_config(&AppConfig::default());
        assert!(mailer.send(welcome("a@b.com", "a")).await.is_ok());
    }
}
