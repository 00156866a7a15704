//! Notification settings, stored as key-value pairs in `settings`

use serde::{Deserialize, Serialize};

pub const KEY_NOTIFICATION_EMAIL: &str = "notification_email";
pub const KEY_NOTIFICATIONS_ENABLED: &str = "notifications_enabled";

/// Who gets told about new bookings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Recipient address; `None` when not configured
    pub recipient_email: Option<String>,
    pub enabled: bool,
}

impl NotificationSettings {
    /// Build from raw stored values. Blank emails count as unset.
    pub fn from_values(email: Option<&str>, enabled: Option<&str>) -> Self {
        Self {
            recipient_email: email
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            enabled: enabled.map(|v| v.trim() == "true").unwrap_or(false),
        }
    }

    /// Recipient to notify, if notifications are switched on
    pub fn active_recipient(&self) -> Option<&str> {
        if self.enabled {
            self.recipient_email.as_deref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values() {
        let settings = NotificationSettings::from_values(Some(" owner@example.com "), Some("true"));
        assert_eq!(settings.recipient_email.as_deref(), Some("owner@example.com"));
        assert!(settings.enabled);
        assert_eq!(settings.active_recipient(), Some("owner@example.com"));

        let blank = NotificationSettings::from_values(Some("  "), Some("true"));
        assert!(blank.recipient_email.is_none());
        assert!(blank.active_recipient().is_none());

        let disabled = NotificationSettings::from_values(Some("owner@example.com"), Some("false"));
        assert!(disabled.active_recipient().is_none());

        assert_eq!(NotificationSettings::from_values(None, None), NotificationSettings::default());
    }
}
