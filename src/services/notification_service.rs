use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;

use crate::config::SmtpSettings;
use crate::utils::AppError;

/// Mensagem de e-mail já montada (texto puro)
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), AppError>;
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self, AppError> {
        // Valida o remetente já no startup
        settings
            .from
            .parse::<lettre::message::Mailbox>()
            .map_err(|e| AppError::ConfigError(format!("invalid MAIL_FROM: {}", e)))?;

        let creds = Credentials::new(settings.username.clone(), settings.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| AppError::ConfigError(format!("invalid SMTP_HOST: {}", e)))?
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: settings.from.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: Notification) -> Result<(), AppError> {
        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| AppError::NotificationError(format!("invalid sender: {}", e)))?,
            )
            .to(notification
                .to
                .parse()
                .map_err(|e| AppError::NotificationError(format!("invalid recipient: {}", e)))?)
            .subject(notification.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body)
            .map_err(|e| AppError::NotificationError(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| AppError::NotificationError(e.to_string()))
    }
}

pub fn payment_verified_email(
    to: &str,
    participant_name: &str,
    participant_id: &str,
    event_name: &str,
    registration_number: &str,
) -> Notification {
    Notification {
        to: to.to_string(),
        subject: format!("Registration confirmed: {}", event_name),
        body: format!(
            "Hello {},\n\n\
             Your payment for {} has been verified.\n\n\
             Participant ID: {}\n\
             Registration number: {}\n\n\
             Please keep these details for check-in at the venue.\n",
            participant_name, event_name, participant_id, registration_number
        ),
    }
}

/// Envia em segundo plano; falha só gera log e nunca afeta a requisição.
pub fn notify_in_background(notifier: Arc<dyn Notifier>, notification: Notification) {
    tokio::spawn(async move {
        let to = notification.to.clone();
        match notifier.send(notification).await {
            Ok(()) => log::info!("📧 Confirmation email sent to {}", to),
            Err(e) => log::warn!("⚠️  Failed to send confirmation email to {}: {}", to, e),
        }
    });
}
