//! Settings service
//!
//! Key-value settings plus the typed notification preferences built on them.

use std::sync::Arc;
use thiserror::Error;

use crate::db::repositories::{Setting, SettingsRepository};
use crate::models::{NotificationSettings, KEY_NOTIFICATIONS_ENABLED, KEY_NOTIFICATION_EMAIL};
use crate::services::realtime::{ChangeEvent, ChangeFeed, Table};
use crate::site::is_valid_email;

/// Settings have no numeric id; change events for them carry this one
pub const SETTINGS_EVENT_ID: i64 = 0;

#[derive(Debug, Error)]
pub enum SettingsServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
    feed: ChangeFeed,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SettingsRepository>, feed: ChangeFeed) -> Self {
        Self { repo, feed }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, SettingsServiceError> {
        Ok(self.repo.get(key).await?.map(|s| s.value))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), SettingsServiceError> {
        self.repo.set(key, value).await?;
        Ok(())
    }

    pub async fn all(&self) -> Result<Vec<Setting>, SettingsServiceError> {
        Ok(self.repo.get_all().await?)
    }

    pub async fn notification_settings(&self) -> Result<NotificationSettings, SettingsServiceError> {
        let values = self
            .repo
            .get_many(&[KEY_NOTIFICATION_EMAIL, KEY_NOTIFICATIONS_ENABLED])
            .await?;
        Ok(NotificationSettings::from_values(
            values.get(KEY_NOTIFICATION_EMAIL).map(String::as_str),
            values.get(KEY_NOTIFICATIONS_ENABLED).map(String::as_str),
        ))
    }

    /// Store new notification preferences.
    ///
    /// Enabling notifications requires a valid recipient address.
    pub async fn update_notification_settings(
        &self,
        settings: NotificationSettings,
    ) -> Result<NotificationSettings, SettingsServiceError> {
        let email = settings
            .recipient_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());

        if let Some(email) = email {
            if !is_valid_email(email) {
                return Err(SettingsServiceError::ValidationError(format!(
                    "Invalid notification email: {}",
                    email
                )));
            }
        } else if settings.enabled {
            return Err(SettingsServiceError::ValidationError(
                "A recipient email is required to enable notifications".into(),
            ));
        }

        let enabled = if settings.enabled { "true" } else { "false" };
        self.repo
            .set_many(&[
                (KEY_NOTIFICATION_EMAIL, email.unwrap_or_default()),
                (KEY_NOTIFICATIONS_ENABLED, enabled),
            ])
            .await?;

        let stored = self.notification_settings().await?;
        tracing::info!("Notification settings updated (enabled: {})", stored.enabled);
        self.feed
            .publish(ChangeEvent::update(Table::Settings, SETTINGS_EVENT_ID, &stored));
        Ok(stored)
    }
}
