use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use tracing::{debug, info, warn};

use crate::config::EmailConfig;

/// What a one-time code authorizes. Stored with the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "code_purpose", rename_all = "snake_case")]
pub enum CodePurpose {
    EmailVerification,
    PasswordReset,
}

impl CodePurpose {
    fn subject(self) -> &'static str {
        match self {
            CodePurpose::EmailVerification => "Verify your email address",
            CodePurpose::PasswordReset => "Password Reset Code",
        }
    }

    fn body(self, code: &str) -> String {
        match self {
            CodePurpose::EmailVerification => {
                format!("Here is your email verification code: {code}")
            }
            CodePurpose::PasswordReset => format!("Here is your password reset code: {code}"),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_code(&self, to: &str, purpose: CodePurpose, code: &str) -> anyhow::Result<()>;
}

/// Builds the SMTP mailer, or one that only logs when mail is not configured.
pub fn from_config(config: Option<&EmailConfig>) -> anyhow::Result<Arc<dyn Mailer>> {
    match config {
        Some(cfg) => Ok(Arc::new(SmtpMailer::new(cfg)?)),
        None => {
            warn!("FROM_MAIL not configured; codes will be logged instead of sent");
            Ok(Arc::new(DisabledMailer))
        }
    }
}

pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(cfg: &EmailConfig) -> anyhow::Result<Self> {
        let from: Mailbox = cfg
            .from_address
            .parse()
            .with_context(|| format!("invalid from address {}", cfg.from_address))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)
            .with_context(|| format!("smtp relay {}", cfg.smtp_host))?
            .port(cfg.smtp_port)
            .credentials(Credentials::new(
                cfg.from_address.clone(),
                cfg.password.clone(),
            ))
            .build();
        Ok(Self { from, transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_code(&self, to: &str, purpose: CodePurpose, code: &str) -> anyhow::Result<()> {
        let to_box: Mailbox = to
            .parse()
            .with_context(|| format!("invalid recipient {to}"))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to_box)
            .subject(purpose.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(purpose.body(code))
            .context("build email")?;

        self.transport.send(message).await.context("smtp send")?;
        info!(to = %to, ?purpose, "code email sent");
        Ok(())
    }
}

pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send_code(&self, to: &str, purpose: CodePurpose, code: &str) -> anyhow::Result<()> {
        warn!(to = %to, ?purpose, "email disabled, code not delivered");
        debug!(to = %to, ?purpose, code = %code, "undelivered code");
        Ok(())
    }
}
