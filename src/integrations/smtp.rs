//! SMTP delivery over STARTTLS.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::instrument;
use uuid::Uuid;

use super::{EmailPayload, EmailReceipt, IntegrationError, Mailer};

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, username: String, password: String, from: String) -> Result<Self, IntegrationError> {
        let from: Mailbox = from.parse().map_err(|_| IntegrationError::InvalidAddress(from.clone()))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| IntegrationError::Smtp(e.to_string()))?
            .port(port)
            .credentials(Credentials::new(username, password))
            .build();
        Ok(Self { transport, from })
    }

    fn build_message(&self, email: &EmailPayload, message_id: &str) -> Result<Message, IntegrationError> {
        let to: Mailbox = email.to.parse().map_err(|_| IntegrationError::InvalidAddress(email.to.clone()))?;
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .message_id(Some(message_id.to_string()));
        let message = match &email.html_body {
            Some(html) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_PLAIN).body(email.text_body.clone()))
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_HTML).body(html.clone())),
            ),
            None => builder.header(ContentType::TEXT_PLAIN).body(email.text_body.clone()),
        };
        message.map_err(|e| IntegrationError::Smtp(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn is_live(&self) -> bool { true }

    #[instrument(skip(self, email), fields(to = %email.to))]
    async fn send_email(&self, email: &EmailPayload) -> Result<EmailReceipt, IntegrationError> {
        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain());
        let message = self.build_message(email, &message_id)?;
        self.transport.send(message).await.map_err(|e| {
            tracing::warn!(error = %e, "SMTP delivery failed");
            IntegrationError::Smtp(e.to_string())
        })?;
        tracing::info!(subject = %email.subject, "email sent");
        Ok(EmailReceipt { message_id, mocked: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> SmtpMailer {
        SmtpMailer::new("smtp.example.nl", 587, "shop".into(), "secret".into(), "Webshop <shop@example.nl>".into()).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_bad_recipient_before_connecting() {
        let email = EmailPayload { to: "not an address".into(), subject: "Hi".into(), text_body: "Hello".into(), html_body: None };
        assert!(matches!(mailer().send_email(&email).await, Err(IntegrationError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_builds_multipart_when_html_present() {
        let email = EmailPayload {
            to: "anna@example.nl".into(),
            subject: "Your order".into(),
            text_body: "Shipped".into(),
            html_body: Some("<p>Shipped</p>".into()),
        };
        let raw = String::from_utf8(mailer().build_message(&email, "<1@example.nl>").unwrap().formatted()).unwrap();
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("Message-ID: <1@example.nl>"));
    }

    #[test]
    fn test_rejects_bad_sender() {
        let result = SmtpMailer::new("smtp.example.nl", 587, "u".into(), "p".into(), "nobody".into());
        assert!(matches!(result, Err(IntegrationError::InvalidAddress(_))));
    }
}
