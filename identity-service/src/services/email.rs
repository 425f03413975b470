//! Outbound email behind a provider trait.
//!
//! Delivery failures are the sender's problem, not the caller's: every
//! call site logs and swallows errors so mail trouble never surfaces as an
//! authentication failure.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmtpConfig;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_invitation(
        &self,
        to_email: &str,
        organization_name: &str,
        inviter_name: &str,
        token: &str,
    ) -> Result<(), anyhow::Error>;

    async fn send_password_reset(&self, to_email: &str, token: &str) -> Result<(), anyhow::Error>;

    async fn send_welcome(&self, to_email: &str, username: &str) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct SmtpEmailService {
    mailer: SmtpTransport,
    from_address: String,
    base_url: String,
}

impl SmtpEmailService {
    pub fn new(config: &SmtpConfig, base_url: String) -> Result<Self, anyhow::Error> {
        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| anyhow::anyhow!("smtp transport: {e}"))?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Email service initialized");

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            base_url,
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        body: String,
    ) -> Result<(), anyhow::Error> {
        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)?;

        // Send in the blocking pool; lettre's SMTP transport is synchronous.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email)).await?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send email");
                Err(anyhow::anyhow!("smtp send: {e}"))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send_invitation(
        &self,
        to_email: &str,
        organization_name: &str,
        inviter_name: &str,
        token: &str,
    ) -> Result<(), anyhow::Error> {
        let accept_url = format!("{}/invitations/{}/accept", self.base_url, token);
        let body = format!(
            r#"<h2>You've been invited!</h2>
            <p><strong>{inviter_name}</strong> has invited you to join <strong>{organization_name}</strong>.</p>
            <p>Follow the link below to create your account. This invitation expires in <strong>7 days</strong>.</p>
            <p><a href="{accept_url}">Accept Invitation</a></p>"#
        );
        self.send_email(
            to_email,
            &format!("You've been invited to join {organization_name}"),
            body,
        )
        .await
    }

    async fn send_password_reset(&self, to_email: &str, token: &str) -> Result<(), anyhow::Error> {
        let reset_url = format!("{}/reset-password?token={}", self.base_url, token);
        let body = format!(
            r#"<h2>Password Reset</h2>
            <p>We received a request to reset your password. This link expires in 1 hour.</p>
            <p><a href="{reset_url}">Reset Password</a></p>
            <p>If you didn't request this, you can safely ignore this email.</p>"#
        );
        self.send_email(to_email, "Reset your password", body).await
    }

    async fn send_welcome(&self, to_email: &str, username: &str) -> Result<(), anyhow::Error> {
        let body = format!(
            r#"<h2>Welcome, {username}!</h2>
            <p>Your account has been created.</p>"#
        );
        self.send_email(to_email, "Welcome!", body).await
    }
}

/// A sent message captured by [`RecordingMailer`].
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub kind: String,
    pub token: Option<String>,
}

/// Test mailer that records instead of sending.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn push(&self, email: SentEmail) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
    }
}

#[async_trait]
impl EmailProvider for RecordingMailer {
    async fn send_invitation(
        &self,
        to_email: &str,
        _organization_name: &str,
        _inviter_name: &str,
        token: &str,
    ) -> Result<(), anyhow::Error> {
        self.push(SentEmail {
            to: to_email.to_string(),
            kind: "invitation".to_string(),
            token: Some(token.to_string()),
        });
        Ok(())
    }

    async fn send_password_reset(&self, to_email: &str, token: &str) -> Result<(), anyhow::Error> {
        self.push(SentEmail {
            to: to_email.to_string(),
            kind: "password_reset".to_string(),
            token: Some(token.to_string()),
        });
        Ok(())
    }

    async fn send_welcome(&self, to_email: &str, _username: &str) -> Result<(), anyhow::Error> {
        self.push(SentEmail {
            to: to_email.to_string(),
            kind: "welcome".to_string(),
            token: None,
        });
        Ok(())
    }
}
