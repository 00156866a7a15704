//! Booking notifications
//!
//! When a booking comes in, the practice owner gets a plain-text email if
//! notifications are switched on. Delivery runs in the background and never
//! fails the booking request.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::SmtpConfig;
use crate::models::Booking;
use crate::services::settings::SettingsService;
use crate::site::find_service;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Anything that can deliver an email
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from = format!("{} <{}>", config.from_name, config.from)
            .parse::<Mailbox>()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email
                .to
                .parse()
                .map_err(|e| anyhow!("Invalid recipient address: {}", e))?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// Used when SMTP is not configured: logs the email instead of sending it
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        tracing::info!(
            "SMTP not configured, dropping email to {}: {}",
            email.to,
            email.subject
        );
        Ok(())
    }
}

/// Pick the mailer for this configuration
pub fn create_mailer(config: &SmtpConfig) -> Result<Arc<dyn Mailer>> {
    if config.is_configured() {
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        Ok(Arc::new(LogMailer))
    }
}

pub struct NotificationService {
    settings: Arc<SettingsService>,
    mailer: Arc<dyn Mailer>,
    site_name: String,
}

impl NotificationService {
    pub fn new(settings: Arc<SettingsService>, mailer: Arc<dyn Mailer>, site_name: impl Into<String>) -> Self {
        Self {
            settings,
            mailer,
            site_name: site_name.into(),
        }
    }

    /// Send the new-booking email in the background
    pub fn notify_new_booking(self: &Arc<Self>, booking: Booking) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.deliver_new_booking(&booking).await {
                Ok(true) => tracing::info!("Sent notification for booking {}", booking.id),
                Ok(false) => tracing::debug!("Notifications disabled, booking {} not sent", booking.id),
                Err(e) => tracing::warn!("Failed to send notification for booking {}: {}", booking.id, e),
            }
        })
    }

    /// Deliver the email now. Returns `false` when notifications are off.
    pub async fn deliver_new_booking(&self, booking: &Booking) -> Result<bool> {
        let settings = self.settings.notification_settings().await?;
        let Some(recipient) = settings.active_recipient() else {
            return Ok(false);
        };

        let email = compose_booking_email(booking, recipient, &self.site_name);
        self.mailer.send(email).await?;
        Ok(true)
    }
}

/// Plain-text email describing a new booking
pub fn compose_booking_email(booking: &Booking, recipient: &str, site_name: &str) -> OutgoingEmail {
    let service = find_service(&booking.service)
        .map(|s| s.name)
        .unwrap_or(booking.service.as_str());

    let mut body = format!(
        "A new session has been requested.\n\n\
         Service: {}\n\
         Date: {}\n\
         Time: {}\n\n\
         Name: {}\n\
         Email: {}\n\
         Phone: {}\n",
        service,
        booking.date.format("%A, %d %B %Y"),
        booking.time.format("%H:%M"),
        booking.customer_name,
        booking.email,
        booking.phone,
    );
    if let Some(message) = booking.message.as_deref().filter(|m| !m.trim().is_empty()) {
        body.push_str("\nMessage:\n");
        body.push_str(message);
        body.push('\n');
    }
    body.push_str(&format!("\nBooking #{} is waiting in the admin area.\n", booking.id));

    OutgoingEmail {
        to: recipient.to_string(),
        subject: format!("[{}] New booking: {} on {}", site_name, booking.customer_name, booking.date),
        body,
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;
    use crate::db::repositories::SqlxSettingsRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{BookingStatus, NotificationSettings};
    use crate::services::realtime::ChangeFeed;
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn booking() -> Booking {
        Booking {
            id: 42,
            customer_name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "+44 20 7946 0000".into(),
            service: "individual-counseling".into(),
            message: Some("First session".into()),
            date: NaiveDate::from_ymd_opt(2030, 3, 4).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            status: BookingStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn setup(mailer: Arc<RecordingMailer>) -> (Arc<NotificationService>, Arc<SettingsService>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let settings = Arc::new(SettingsService::new(
            SqlxSettingsRepository::boxed(pool),
            ChangeFeed::default(),
        ));
        let service = Arc::new(NotificationService::new(settings.clone(), mailer, "Clearpath"));
        (service, settings)
    }

    #[test]
    fn test_compose_booking_email() {
        let email = compose_booking_email(&booking(), "owner@example.com", "Clearpath");
        assert_eq!(email.to, "owner@example.com");
        assert!(email.subject.starts_with("[Clearpath] New booking: Ada Lovelace"));
        assert!(email.body.contains("Individual Counseling"));
        assert!(email.body.contains("Monday, 04 March 2030"));
        assert!(email.body.contains("10:00"));
        assert!(email.body.contains("First session"));
        assert!(email.body.contains("#42"));
    }

    #[tokio::test]
    async fn test_disabled_sends_nothing() {
        let mailer = Arc::new(RecordingMailer::default());
        let (service, _) = setup(mailer.clone()).await;

        assert!(!service.deliver_new_booking(&booking()).await.unwrap());
        assert!(mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_enabled_sends_in_background() {
        let mailer = Arc::new(RecordingMailer::default());
        let (service, settings) = setup(mailer.clone()).await;
        settings
            .update_notification_settings(NotificationSettings {
                recipient_email: Some("owner@example.com".into()),
                enabled: true,
            })
            .await
            .unwrap();

        service.notify_new_booking(booking()).await.unwrap();

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "owner@example.com");
    }

    #[tokio::test]
    async fn test_delivery_failure_is_contained() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let (service, settings) = setup(mailer).await;
        settings
            .update_notification_settings(NotificationSettings {
                recipient_email: Some("owner@example.com".into()),
                enabled: true,
            })
            .await
            .unwrap();

        assert!(service.deliver_new_booking(&booking()).await.is_err());
        // The background task logs and finishes without panicking
        assert!(service.notify_new_booking(booking()).await.is_ok());
    }

    #[test]
    fn test_create_mailer_without_smtp_falls_back() {
        assert!(create_mailer(&SmtpConfig::default()).is_ok());
    }
}
