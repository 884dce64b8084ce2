use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::Mailbox,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

/// Notification sink for the password-reset flow. Delivery failures are
/// reported to the caller; they never roll back already-persisted state.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_reset_link(&self, to: &str, reset_url: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .context("smtp relay")?
            .credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ))
            .build();
        let from = cfg.from.parse::<Mailbox>().context("smtp from address")?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_reset_link(&self, to: &str, reset_url: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>().context("recipient address")?)
            .subject("Password Reset")
            .body(reset_body(reset_url))
            .context("build reset mail")?;
        self.transport
            .send(message)
            .await
            .context("smtp send reset mail")?;
        Ok(())
    }
}

/// The link the user clicks, e.g. "https://app.example.com/reset-password/<token>".
pub fn reset_link(public_base_url: &str, token: &str) -> String {
    format!(
        "{}/reset-password/{}",
        public_base_url.trim_end_matches('/'),
        token
    )
}

fn reset_body(reset_url: &str) -> String {
    format!(
        "You are receiving this because you (or someone else) have requested \
         the reset of the password for your account.\n\n\
         Please click on the following link, or paste this into your browser \
         to complete the process:\n\n\
         {}\n\n\
         If you did not request this, please ignore this email and your \
         password will remain unchanged.\n",
        reset_url
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_embeds_token_under_base_url() {
        let link = reset_link("https://app.example.com", "abc123");
        assert_eq!(link, "https://app.example.com/reset-password/abc123");
    }

    #[test]
    fn reset_link_tolerates_trailing_slash() {
        let link = reset_link("http://localhost:3000/", "deadbeef");
        assert_eq!(link, "http://localhost:3000/reset-password/deadbeef");
    }

    #[test]
    fn reset_body_contains_the_link() {
        let body = reset_body("http://localhost:3000/reset-password/tok");
        assert!(body.contains("http://localhost:3000/reset-password/tok"));
        assert!(body.contains("ignore this email"));
    }
}
