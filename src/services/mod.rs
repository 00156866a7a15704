//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They:
//! - enforce validation and business rules
//! - keep the post cache coherent
//! - publish change events for the admin dashboard

pub mod booking;
pub mod markdown;
pub mod notification;
pub mod password;
pub mod post;
pub mod rate_limiter;
pub mod realtime;
pub mod settings;
pub mod user;

pub use booking::{BookingService, BookingServiceError, BookingStats};
pub use markdown::MarkdownRenderer;
pub use notification::{create_mailer, Mailer, NotificationService, OutgoingEmail, SmtpMailer};
pub use password::{hash_password, verify_password};
pub use post::{generate_slug, PostService, PostServiceError, PostStats};
pub use rate_limiter::LoginRateLimiter;
pub use realtime::{ChangeEvent, ChangeFeed, ChangeKind, ChangeSubscription, Table};
pub use settings::{SettingsService, SettingsServiceError};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
