use crate::config::SmtpSettings;
use crate::error::AppError;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub attachment: Option<EmailAttachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError>;
}

pub struct SmtpMailer {
    settings: SmtpSettings,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Result<Self, AppError> {
        if !settings.enabled {
            return Ok(Self {
                settings,
                transport: None,
            });
        }

        let creds = Credentials::new(
            settings.user.clone(),
            settings.password.expose_secret().clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| AppError::Config(format!("Failed to create SMTP relay: {}", e)))?
            .port(settings.port)
            .credentials(creds)
            .build();

        Ok(Self {
            settings,
            transport: Some(transport),
        })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, AppError> {
        let from: Mailbox = format!("{} <{}>", self.settings.from_name, self.settings.from_email)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid from address: {}", e)))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::Validation(vec![format!("to: invalid recipient ({})", e)]))?;

        let builder = Message::builder().from(from).to(to).subject(&email.subject);

        let text = SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .body(email.body_text.clone());

        let message = match &email.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .map_err(|e| AppError::Email(format!("Invalid attachment type: {}", e)))?;
                builder.multipart(
                    MultiPart::mixed().singlepart(text).singlepart(
                        Attachment::new(attachment.filename.clone())
                            .body(attachment.bytes.clone(), content_type),
                    ),
                )?
            }
            None => builder.singlepart(text)?,
        };

        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| AppError::Email("Email delivery is not enabled".to_string()))?;

        let message = self.build_message(email)?;

        transport
            .send(message)
            .await
            .map_err(|e| AppError::Email(format!("Failed to send email: {}", e)))?;

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Email sent successfully"
        );

        Ok(())
    }
}

/// Records messages instead of sending them.
#[derive(Default)]
pub struct MockMailer {
    send_count: AtomicU64,
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: bool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::Email("Mock mailer configured to fail".to_string()));
        }

        self.send_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }

        tracing::info!(to = %email.to, subject = %email.subject, "[MOCK] Email recorded");
        Ok(())
    }
}
