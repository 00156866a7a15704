//! Booking service
//!
//! New bookings are replayed through the wizard so the server applies the
//! same catalog, availability and contact rules as the booking page.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::db::repositories::BookingRepository;
use crate::models::{Booking, BookingStatus, CreateBookingInput};
use crate::services::notification::NotificationService;
use crate::services::realtime::{ChangeEvent, ChangeFeed, Table};
use crate::site::{AvailabilityRules, BookingRequest, BookingWizard, WizardError};

#[derive(Debug, thiserror::Error)]
pub enum BookingServiceError {
    #[error("Booking not found: {0}")]
    NotFound(i64),

    #[error("Invalid booking: {0}")]
    InvalidBooking(#[from] WizardError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingStats {
    pub total: i64,
    /// Bookings still needing attention
    pub open: i64,
    /// Every status, zero-filled
    pub by_status: BTreeMap<String, i64>,
}

pub struct BookingService {
    repo: Arc<dyn BookingRepository>,
    feed: ChangeFeed,
    rules: AvailabilityRules,
    notifications: Option<Arc<NotificationService>>,
}

impl BookingService {
    pub fn new(repo: Arc<dyn BookingRepository>, feed: ChangeFeed, rules: AvailabilityRules) -> Self {
        Self {
            repo,
            feed,
            rules,
            notifications: None,
        }
    }

    pub fn with_notifications(mut self, notifications: Arc<NotificationService>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub fn rules(&self) -> &AvailabilityRules {
        &self.rules
    }

    pub async fn create(&self, input: CreateBookingInput) -> Result<Booking, BookingServiceError> {
        self.create_on(input, Local::now().date_naive()).await
    }

    /// Validate against the rules as they stand on `today`, then persist
    pub async fn create_on(
        &self,
        input: CreateBookingInput,
        today: NaiveDate,
    ) -> Result<Booking, BookingServiceError> {
        let validated = BookingWizard::replay(&self.rules, today, &BookingRequest::from(&input))?;

        let booking = self.repo.create(&validated).await?;
        tracing::info!(
            "New booking {} for {} on {} at {}",
            booking.id,
            booking.service,
            booking.date,
            booking.time.format("%H:%M")
        );

        self.feed
            .publish(ChangeEvent::insert(Table::Bookings, booking.id, &booking));
        if let Some(notifications) = &self.notifications {
            notifications.notify_new_booking(booking.clone());
        }
        Ok(booking)
    }

    /// All bookings, latest appointment first
    pub async fn list(&self) -> Result<Vec<Booking>, BookingServiceError> {
        Ok(self.repo.list().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Booking, BookingServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(BookingServiceError::NotFound(id))
    }

    /// Any status may follow any other; concurrent changes resolve to the last write.
    pub async fn update_status(
        &self,
        id: i64,
        status: BookingStatus,
    ) -> Result<Booking, BookingServiceError> {
        let booking = self
            .repo
            .update_status(id, status)
            .await?
            .ok_or(BookingServiceError::NotFound(id))?;

        tracing::info!("Booking {} is now {}", id, status);
        self.feed
            .publish(ChangeEvent::update(Table::Bookings, id, &booking));
        Ok(booking)
    }

    pub async fn delete(&self, id: i64) -> Result<(), BookingServiceError> {
        if !self.repo.delete(id).await? {
            return Err(BookingServiceError::NotFound(id));
        }
        tracing::info!("Deleted booking {}", id);
        self.feed.publish(ChangeEvent::delete(Table::Bookings, id));
        Ok(())
    }

    pub async fn stats(&self) -> Result<BookingStats, BookingServiceError> {
        let counts = self.repo.count_by_status().await?;

        let mut stats = BookingStats::default();
        for status in BookingStatus::ALL {
            let count = counts.get(&status).copied().unwrap_or(0);
            stats.total += count;
            if status.is_open() {
                stats.open += count;
            }
            stats.by_status.insert(status.as_str().to_string(), count);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxBookingRepository, SqlxSettingsRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::NotificationSettings;
    use crate::services::notification::testing::RecordingMailer;
    use crate::services::realtime::ChangeKind;
    use crate::services::settings::SettingsService;
    use chrono::NaiveTime;
    use std::time::Duration;

    // Monday
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, 4).unwrap()
    }

    fn input() -> CreateBookingInput {
        CreateBookingInput {
            customer_name: " Grace Hopper ".into(),
            email: "grace@example.com".into(),
            phone: "555 010 0200".into(),
            service: "couples-counseling".into(),
            message: Some("Evenings are hard for us".into()),
            date: NaiveDate::from_ymd_opt(2030, 3, 5).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        }
    }

    async fn setup_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    async fn setup() -> (BookingService, ChangeFeed) {
        let pool = setup_pool().await;
        let feed = ChangeFeed::default();
        let service = BookingService::new(
            SqlxBookingRepository::boxed(pool),
            feed.clone(),
            AvailabilityRules::default(),
        );
        (service, feed)
    }

    #[tokio::test]
    async fn test_create_validates_and_publishes() {
        let (service, feed) = setup().await;
        let mut events = feed.subscribe();

        let booking = service.create_on(input(), today()).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.customer_name, "Grace Hopper");

        let event = events.recv().await.unwrap();
        assert_eq!(event.table, Table::Bookings);
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.id, booking.id);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let (service, _) = setup().await;

        let sunday = CreateBookingInput {
            date: NaiveDate::from_ymd_opt(2030, 3, 10).unwrap(),
            ..input()
        };
        assert!(matches!(
            service.create_on(sunday, today()).await,
            Err(BookingServiceError::InvalidBooking(WizardError::DateUnavailable(_)))
        ));

        let bad_phone = CreateBookingInput {
            phone: "12".into(),
            ..input()
        };
        assert!(matches!(
            service.create_on(bad_phone, today()).await,
            Err(BookingServiceError::InvalidBooking(WizardError::InvalidDetails { field: "phone", .. }))
        ));

        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_changes_are_unrestricted() {
        let (service, feed) = setup().await;
        let booking = service.create_on(input(), today()).await.unwrap();
        let mut events = feed.subscribe();

        let closed = service
            .update_status(booking.id, BookingStatus::Closed)
            .await
            .unwrap();
        assert_eq!(closed.status, BookingStatus::Closed);

        let reopened = service
            .update_status(booking.id, BookingStatus::Pending)
            .await
            .unwrap();
        assert_eq!(reopened.status, BookingStatus::Pending);

        assert_eq!(events.recv().await.unwrap().kind, ChangeKind::Update);
        assert!(matches!(
            service.update_status(999, BookingStatus::Closed).await,
            Err(BookingServiceError::NotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_delete_and_stats() {
        let (service, feed) = setup().await;
        let first = service.create_on(input(), today()).await.unwrap();
        let second = service.create_on(input(), today()).await.unwrap();
        service
            .update_status(second.id, BookingStatus::Cancelled)
            .await
            .unwrap();

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.open, 1);
        assert_eq!(stats.by_status["cancelled"], 1);
        assert_eq!(stats.by_status["closed"], 0);
        assert_eq!(stats.by_status.len(), BookingStatus::ALL.len());

        let mut events = feed.subscribe();
        service.delete(first.id).await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert!(event.record.is_none());

        assert!(matches!(
            service.get(first.id).await,
            Err(BookingServiceError::NotFound(_))
        ));
        assert!(service.delete(first.id).await.is_err());
    }

    #[tokio::test]
    async fn test_create_sends_notification() {
        let pool = setup_pool().await;
        let feed = ChangeFeed::default();
        let settings = Arc::new(SettingsService::new(
            SqlxSettingsRepository::boxed(pool.clone()),
            feed.clone(),
        ));
        settings
            .update_notification_settings(NotificationSettings {
                recipient_email: Some("owner@example.com".into()),
                enabled: true,
            })
            .await
            .unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let notifications = Arc::new(NotificationService::new(settings, mailer.clone(), "Clearpath"));
        let service = BookingService::new(
            SqlxBookingRepository::boxed(pool),
            feed,
            AvailabilityRules::default(),
        )
        .with_notifications(notifications);

        service.create_on(input(), today()).await.unwrap();

        // Delivery happens on a spawned task
        for _ in 0..50 {
            if !mailer.sent.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("Couples Counseling"));
    }
}
