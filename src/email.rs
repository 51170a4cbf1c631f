use axum::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

/// Outbound mail seam. Send failures propagate to the triggering request;
/// registration and reset mails are not fire-and-forget.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_email(
        &self,
        to: &str,
        name: &str,
        link: &str,
        expiry_hours: i64,
    ) -> anyhow::Result<()>;

    async fn send_password_reset_email(
        &self,
        to: &str,
        name: &str,
        link: &str,
        expiry_hours: i64,
    ) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_transport(&self) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = if self.config.port == 465 {
            // SSL/TLS on port 465
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)?.port(465)
        } else {
            // STARTTLS on port 587 or plain for local testing
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?
                .port(self.config.port)
        };

        if let (Some(user), Some(pass)) = (&self.config.user, &self.config.pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(builder.build())
    }

    async fn send_html(&self, to: &str, subject: &str, body: String) -> anyhow::Result<()> {
        let from = format!("{} <{}>", self.config.from_name, self.config.from_email);

        let email = Message::builder()
            .from(from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)?;

        self.build_transport()?.send(email).await?;
        info!(to = %to, subject = %subject, "email sent");
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification_email(
        &self,
        to: &str,
        name: &str,
        link: &str,
        expiry_hours: i64,
    ) -> anyhow::Result<()> {
        self.send_html(to, "Verify your email", verification_body(name, link, expiry_hours))
            .await
    }

    async fn send_password_reset_email(
        &self,
        to: &str,
        name: &str,
        link: &str,
        expiry_hours: i64,
    ) -> anyhow::Result<()> {
        self.send_html(
            to,
            "Password Reset Request",
            password_reset_body(name, link, expiry_hours),
        )
        .await
    }
}

fn verification_body(name: &str, link: &str, expiry_hours: i64) -> String {
    format!(
        r#"<html>
  <body>
    <p>Hi {name},</p>
    <p>Thanks for signing up. Please verify your email address by clicking the link below:</p>
    <p><a href="{link}">Verify my email</a></p>
    <p>This link expires in {expiry_hours} hours. If you didn't create an account, you can ignore this email.</p>
    <p>- The Nutrilog team</p>
  </body>
</html>"#
    )
}

fn password_reset_body(name: &str, link: &str, expiry_hours: i64) -> String {
    format!(
        r#"<html>
  <body>
    <p>Hi {name},</p>
    <p>We received a request to reset your password. Click the link below to choose a new one:</p>
    <p><a href="{link}">Reset my password</a></p>
    <p>This link expires in {expiry_hours} hours. If you didn't request this, you can ignore this email.</p>
    <p>- The Nutrilog team</p>
  </body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_body_contains_link_and_expiry() {
        let body = verification_body("Ada", "http://localhost/verify/abc/def", 48);
        assert!(body.contains("Hi Ada,"));
        assert!(body.contains("http://localhost/verify/abc/def"));
        assert!(body.contains("48 hours"));
    }

    #[test]
    fn reset_body_contains_link() {
        let body = password_reset_body("Ada", "http://localhost/reset/abc/def", 24);
        assert!(body.contains("Reset my password"));
        assert!(body.contains("http://localhost/reset/abc/def"));
    }
}
