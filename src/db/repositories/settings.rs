//! Settings repository
//!
//! Key-value storage for site settings such as notification preferences.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;

/// A setting key-value pair
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Setting {
    #[sqlx(rename = "setting_key")]
    pub key: String,
    #[sqlx(rename = "setting_value")]
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for settings operations
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Setting>>;

    async fn get_all(&self) -> Result<Vec<Setting>>;

    /// Values for the given keys; missing keys are absent from the map
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>>;

    /// Insert or overwrite a single setting
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn set_many(&self, settings: &[(&str, &str)]) -> Result<()>;
}

/// SQLx-based settings repository
pub struct SqlxSettingsRepository {
    pool: DynDatabasePool,
}

impl SqlxSettingsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SettingsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SettingsRepository for SqlxSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<Setting>> {
        let sql = "SELECT setting_key, setting_value, updated_at FROM settings WHERE setting_key = ?";
        let setting = with_pool!(self.pool, p => {
            sqlx::query_as(sql).bind(key).fetch_optional(p).await
        })
        .with_context(|| format!("Failed to read setting {}", key))?;
        Ok(setting)
    }

    async fn get_all(&self) -> Result<Vec<Setting>> {
        let sql = "SELECT setting_key, setting_value, updated_at FROM settings ORDER BY setting_key";
        let settings = with_pool!(self.pool, p => {
            sqlx::query_as(sql).fetch_all(p).await
        })
        .context("Failed to read settings")?;
        Ok(settings)
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let mut result = HashMap::new();
        for key in keys {
            if let Some(setting) = self.get(key).await? {
                result.insert(setting.key, setting.value);
            }
        }
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    "INSERT INTO settings (setting_key, setting_value, updated_at) VALUES (?, ?, ?)
                     ON CONFLICT(setting_key) DO UPDATE
                     SET setting_value = excluded.setting_value, updated_at = excluded.updated_at",
                )
                .bind(key)
                .bind(value)
                .bind(now)
                .execute(crate::db::sqlite(&self.pool)?)
                .await
                .map(|_| ())
            }
            DatabaseDriver::Mysql => {
                sqlx::query(
                    "INSERT INTO settings (setting_key, setting_value, updated_at) VALUES (?, ?, ?)
                     ON DUPLICATE KEY UPDATE
                     setting_value = VALUES(setting_value), updated_at = VALUES(updated_at)",
                )
                .bind(key)
                .bind(value)
                .bind(now)
                .execute(crate::db::mysql(&self.pool)?)
                .await
                .map(|_| ())
            }
        }
        .with_context(|| format!("Failed to write setting {}", key))?;
        Ok(())
    }

    async fn set_many(&self, settings: &[(&str, &str)]) -> Result<()> {
        for (key, value) in settings {
            self.set(key, value).await?;
        }
        Ok(())
    }
}
