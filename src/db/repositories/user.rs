//! User repository
//!
//! Database operations for admin accounts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::User;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Case-insensitive lookup by login email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn count(&self) -> Result<i64>;
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    display_name: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// SQLx-based user repository for SQLite and MySQL
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_USER: &str = "INSERT INTO users (email, display_name, password_hash, created_at, updated_at) \
     VALUES (?, ?, ?, ?, ?)";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let email = user.email.trim().to_lowercase();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_USER)
                .bind(&email)
                .bind(&user.display_name)
                .bind(&user.password_hash)
                .bind(user.created_at)
                .bind(user.updated_at)
                .execute(crate::db::sqlite(&self.pool)?)
                .await
                .context("Failed to create user")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_USER)
                .bind(&email)
                .bind(&user.display_name)
                .bind(&user.password_hash)
                .bind(user.created_at)
                .bind(user.updated_at)
                .execute(crate::db::mysql(&self.pool)?)
                .await
                .context("Failed to create user")?
                .last_insert_id() as i64,
        };

        Ok(User {
            id,
            email,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = "SELECT id, email, display_name, password_hash, created_at, updated_at \
                   FROM users WHERE id = ?";
        let row: Option<UserRow> = with_pool!(self.pool, p => {
            sqlx::query_as(sql).bind(id).fetch_optional(p).await
        })
        .context("Failed to get user by ID")?;
        Ok(row.map(User::from))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = "SELECT id, email, display_name, password_hash, created_at, updated_at \
                   FROM users WHERE email = ?";
        let email = email.trim().to_lowercase();
        let row: Option<UserRow> = with_pool!(self.pool, p => {
            sqlx::query_as(sql).bind(&email).fetch_optional(p).await
        })
        .context("Failed to get user by email")?;
        Ok(row.map(User::from))
    }

    async fn count(&self) -> Result<i64> {
        let count = with_pool!(self.pool, p => {
            sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(p).await
        })
        .context("Failed to count users")?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn admin(email: &str) -> User {
        User::new(email.to_string(), "Admin".to_string(), "$argon2id$hash".to_string())
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = setup_test_repo().await;
        assert_eq!(repo.count().await.unwrap(), 0);

        let created = repo
            .create(&admin("Owner@Example.com"))
            .await
            .expect("Failed to create user");
        assert!(created.id > 0);
        assert_eq!(created.email, "owner@example.com");

        let by_email = repo
            .get_by_email("OWNER@example.com ")
            .await
            .unwrap()
            .expect("User not found");
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.password_hash, "$argon2id$hash");

        assert!(repo.get_by_id(created.id).await.unwrap().is_some());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = setup_test_repo().await;
        repo.create(&admin("owner@example.com")).await.unwrap();
        assert!(repo.create(&admin("owner@example.com")).await.is_err());
    }
}
