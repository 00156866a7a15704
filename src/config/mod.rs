//! Configuration management
//!
//! This module handles loading and parsing configuration for Clearpath.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Public site information
    #[serde(default)]
    pub site: SiteConfig,
    /// Booking availability rules
    #[serde(default)]
    pub booking: BookingConfig,
    /// Outgoing mail
    #[serde(default)]
    pub smtp: SmtpConfig,
    /// Admin account bootstrap
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a reverse proxy that overwrites these headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            trust_proxy_headers: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/clearpath.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl() -> u64 {
    600
}

fn default_max_entries() -> u64 {
    10_000
}

/// Public site information shown on the informational pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_name")]
    pub name: String,
    #[serde(default = "default_tagline")]
    pub tagline: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: String,
    /// Team members listed on the team page
    #[serde(default = "default_team")]
    pub team: Vec<TeamMember>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            tagline: default_tagline(),
            contact_email: String::new(),
            contact_phone: String::new(),
            team: default_team(),
        }
    }
}

fn default_site_name() -> String {
    "Clearpath".to_string()
}

fn default_tagline() -> String {
    "Counseling and corporate training".to_string()
}

fn default_team() -> Vec<TeamMember> {
    vec![TeamMember {
        name: "Practice Lead".to_string(),
        role: "Counselor".to_string(),
        bio: String::new(),
    }]
}

/// A person listed on the team page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub bio: String,
}

/// Opening window for one weekday
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl OpeningHours {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self { open, close }
    }
}

/// Opening hours per weekday. `None` means closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyHours {
    #[serde(default)]
    pub monday: Option<OpeningHours>,
    #[serde(default)]
    pub tuesday: Option<OpeningHours>,
    #[serde(default)]
    pub wednesday: Option<OpeningHours>,
    #[serde(default)]
    pub thursday: Option<OpeningHours>,
    #[serde(default)]
    pub friday: Option<OpeningHours>,
    #[serde(default)]
    pub saturday: Option<OpeningHours>,
    #[serde(default)]
    pub sunday: Option<OpeningHours>,
}

impl Default for WeeklyHours {
    fn default() -> Self {
        let weekday = Some(OpeningHours::new(hm(9, 0), hm(17, 0)));
        Self {
            monday: weekday,
            tuesday: weekday,
            wednesday: weekday,
            thursday: weekday,
            friday: weekday,
            saturday: Some(OpeningHours::new(hm(10, 0), hm(14, 0))),
            sunday: None,
        }
    }
}

impl WeeklyHours {
    /// Iterate over all configured windows
    pub fn windows(&self) -> impl Iterator<Item = &OpeningHours> {
        [
            &self.monday,
            &self.tuesday,
            &self.wednesday,
            &self.thursday,
            &self.friday,
            &self.saturday,
            &self.sunday,
        ]
        .into_iter()
        .flatten()
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Booking availability rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    #[serde(default)]
    pub weekly_hours: WeeklyHours,
    /// Distance between slot start times
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: u32,
    /// Days between today and the first bookable date
    #[serde(default = "default_min_notice_days")]
    pub min_notice_days: u32,
    /// Days between today and the last bookable date
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    /// Dates on which no bookings are taken
    #[serde(default)]
    pub blackout_dates: Vec<NaiveDate>,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            weekly_hours: WeeklyHours::default(),
            slot_minutes: default_slot_minutes(),
            min_notice_days: default_min_notice_days(),
            horizon_days: default_horizon_days(),
            blackout_dates: Vec::new(),
        }
    }
}

fn default_slot_minutes() -> u32 {
    60
}

fn default_min_notice_days() -> u32 {
    1
}

fn default_horizon_days() -> u32 {
    60
}

/// SMTP configuration for booking notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay host. Empty disables sending.
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from: String,
    #[serde(default = "default_site_name")]
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from: String::new(),
            from_name: default_site_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

impl SmtpConfig {
    /// Whether enough is configured to attempt delivery
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty() && !self.from.trim().is_empty()
    }
}

/// Admin account created on first start when no account exists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern `CLEARPATH_<SECTION>_<FIELD>`:
    /// - CLEARPATH_SERVER_HOST, CLEARPATH_SERVER_PORT, CLEARPATH_SERVER_CORS_ORIGIN,
    ///   CLEARPATH_SERVER_TRUST_PROXY_HEADERS
    /// - CLEARPATH_DATABASE_DRIVER, CLEARPATH_DATABASE_URL
    /// - CLEARPATH_CACHE_TTL_SECONDS
    /// - CLEARPATH_SMTP_HOST, CLEARPATH_SMTP_PORT, CLEARPATH_SMTP_USERNAME,
    ///   CLEARPATH_SMTP_PASSWORD, CLEARPATH_SMTP_FROM
    /// - CLEARPATH_ADMIN_EMAIL, CLEARPATH_ADMIN_PASSWORD
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("CLEARPATH_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("CLEARPATH_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("CLEARPATH_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(trust) = std::env::var("CLEARPATH_SERVER_TRUST_PROXY_HEADERS") {
            if let Ok(trust) = trust.parse::<bool>() {
                self.server.trust_proxy_headers = trust;
            }
        }

        if let Ok(driver) = std::env::var("CLEARPATH_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("CLEARPATH_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(ttl) = std::env::var("CLEARPATH_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        if let Ok(host) = std::env::var("CLEARPATH_SMTP_HOST") {
            self.smtp.host = host;
        }
        if let Ok(port) = std::env::var("CLEARPATH_SMTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.smtp.port = port;
            }
        }
        if let Ok(username) = std::env::var("CLEARPATH_SMTP_USERNAME") {
            self.smtp.username = username;
        }
        if let Ok(password) = std::env::var("CLEARPATH_SMTP_PASSWORD") {
            self.smtp.password = password;
        }
        if let Ok(from) = std::env::var("CLEARPATH_SMTP_FROM") {
            self.smtp.from = from;
        }

        if let Ok(email) = std::env::var("CLEARPATH_ADMIN_EMAIL") {
            self.admin.email = Some(email);
        }
        if let Ok(password) = std::env::var("CLEARPATH_ADMIN_PASSWORD") {
            self.admin.password = Some(password);
        }
    }

    /// Reject settings the booking rules cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let booking = &self.booking;
        if booking.slot_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "booking.slot_minutes must be greater than zero".to_string(),
            ));
        }
        if booking.min_notice_days > booking.horizon_days {
            return Err(ConfigError::ValidationError(
                "booking.min_notice_days must not exceed booking.horizon_days".to_string(),
            ));
        }
        if let Some(bad) = booking.weekly_hours.windows().find(|w| w.open >= w.close) {
            return Err(ConfigError::ValidationError(format!(
                "opening time {} must be before closing time {}",
                bad.open, bad.close
            )));
        }
        Ok(())
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
