//! Database layer
//!
//! SQLite (default, single-file deployment) and MySQL behind one
//! `DatabasePool` trait. The driver is selected by configuration.
//!
//! ```ignore
//! use clearpath::config::DatabaseConfig;
//! use clearpath::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, mysql, sqlite, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
