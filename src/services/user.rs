//! User service
//!
//! Admin accounts and login sessions. The practice runs a single admin
//! area, so every account has full access; registration is open only until
//! the first account exists.

use anyhow::Context;
use chrono::Duration;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User};
use crate::services::password::{check_password_strength, hash_password, verify_password};
use crate::site::is_valid_email;

/// Lifetime of a login session
pub const SESSION_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Registration is closed")]
    RegistrationClosed,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_lifetime: Duration,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self {
            user_repo,
            session_repo,
            session_lifetime: Duration::days(SESSION_DAYS),
        }
    }

    pub fn with_session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = lifetime;
        self
    }

    pub fn session_lifetime(&self) -> Duration {
        self.session_lifetime
    }

    pub async fn has_admin(&self) -> Result<bool, UserServiceError> {
        Ok(self.user_repo.count().await? > 0)
    }

    /// Create the first admin account. Fails once any account exists.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        if self.has_admin().await? {
            return Err(UserServiceError::RegistrationClosed);
        }
        self.create_account(input).await
    }

    /// Create the configured admin on an empty database.
    ///
    /// Returns `None` when an account already exists.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<Option<User>, UserServiceError> {
        if self.has_admin().await? {
            return Ok(None);
        }
        let user = self
            .create_account(RegisterInput {
                email: email.to_string(),
                display_name: String::new(),
                password: password.to_string(),
            })
            .await?;
        tracing::info!("Created initial admin account {}", user.email);
        Ok(Some(user))
    }

    async fn create_account(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let email = input.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(UserServiceError::ValidationError("Invalid email address".into()));
        }
        check_password_strength(&input.password).map_err(UserServiceError::ValidationError)?;

        if self.user_repo.get_by_email(&email).await?.is_some() {
            return Err(UserServiceError::UserExists(email));
        }

        let display_name = match input.display_name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            name => name.to_string(),
        };
        let password_hash = hash_password(&input.password)?;

        let user = self
            .user_repo
            .create(&User::new(email, display_name, password_hash))
            .await
            .context("Failed to create user")?;
        Ok(user)
    }

    /// Verify credentials and open a new session
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid email or password".into());

        let user = self.user_repo.get_by_email(&input.email).await?.ok_or_else(invalid)?;
        let valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(invalid());
        }

        let session = Session::issue(user.id, self.session_lifetime);
        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        tracing::info!("Admin {} logged in", user.email);
        Ok((session, user))
    }

    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo.delete(token).await?;
        Ok(())
    }

    /// Resolve a session token to its user. Expired sessions are removed and
    /// treated as absent.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self.session_repo.get_by_id(token).await? else {
            return Ok(None);
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to remove expired session: {}", e);
            }
            return Ok(None);
        }

        Ok(self.user_repo.get_by_id(session.user_id).await?)
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self.session_repo.delete_expired().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
    }

    fn register_input(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            display_name: String::new(),
            password: "correct-horse".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_only_first_admin() {
        let service = setup().await;
        assert!(!service.has_admin().await.unwrap());

        let user = service.register(register_input("Owner@Example.com")).await.unwrap();
        assert_eq!(user.email, "owner@example.com");
        assert_eq!(user.display_name, "owner");
        assert!(service.has_admin().await.unwrap());

        let second = service.register(register_input("other@example.com")).await;
        assert!(matches!(second, Err(UserServiceError::RegistrationClosed)));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = setup().await;
        let bad_email = service.register(register_input("not-an-email")).await;
        assert!(matches!(bad_email, Err(UserServiceError::ValidationError(_))));

        let mut weak = register_input("owner@example.com");
        weak.password = "short".into();
        assert!(matches!(
            service.register(weak).await,
            Err(UserServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let service = setup().await;
        let created = service.ensure_admin("admin@example.com", "bootstrap-pass").await.unwrap();
        assert!(created.is_some());
        let again = service.ensure_admin("admin@example.com", "bootstrap-pass").await.unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_login_validate_logout() {
        let service = setup().await;
        service.register(register_input("owner@example.com")).await.unwrap();

        let wrong = service
            .login(LoginInput {
                email: "owner@example.com".into(),
                password: "nope-nope".into(),
            })
            .await;
        assert!(matches!(wrong, Err(UserServiceError::AuthenticationError(_))));

        let unknown = service
            .login(LoginInput {
                email: "ghost@example.com".into(),
                password: "correct-horse".into(),
            })
            .await;
        assert!(matches!(unknown, Err(UserServiceError::AuthenticationError(_))));

        let (session, user) = service
            .login(LoginInput {
                email: "OWNER@example.com".into(),
                password: "correct-horse".into(),
            })
            .await
            .unwrap();
        assert_eq!(user.email, "owner@example.com");

        let resolved = service.validate_session(&session.id).await.unwrap();
        assert_eq!(resolved.map(|u| u.id), Some(user.id));

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_rejected_and_cleaned() {
        let service = setup().await.with_session_lifetime(Duration::seconds(-1));
        service.register(register_input("owner@example.com")).await.unwrap();

        let (session, _) = service
            .login(LoginInput {
                email: "owner@example.com".into(),
                password: "correct-horse".into(),
            })
            .await
            .unwrap();

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 0);
    }
}
