//! Database repositories
//!
//! Repository pattern implementations for database access. Each repository is
//! an `async_trait` interface plus a `Sqlx*Repository` implementation that
//! works against both SQLite and MySQL.

/// Run the same query code against whichever pool is configured.
///
/// `$p` is bound to the concrete `SqlitePool` or `MySqlPool`; the body is
/// expanded once per driver, so it must be generic over the executor.
macro_rules! with_pool {
    ($pool:expr, $p:ident => $body:expr) => {
        match $pool.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $p = $crate::db::sqlite(&$pool)?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $p = $crate::db::mysql(&$pool)?;
                $body
            }
        }
    };
}

pub mod booking;
pub mod post;
pub mod session;
pub mod settings;
pub mod user;

pub use booking::{BookingRepository, SqlxBookingRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use settings::{Setting, SettingsRepository, SqlxSettingsRepository};
pub use user::{SqlxUserRepository, UserRepository};
