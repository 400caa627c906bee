//! User service
//!
//! Registration, login sessions and permission checks. The first account
//! ever registered becomes a superuser.

use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use serde::Deserialize;
use thiserror::Error;

use super::password::{hash_password, verify_password};
use crate::db::is_unique_violation;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Permission, Session, User};

const MAX_USERNAME_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 8;
const DEFAULT_SESSION_DAYS: i64 = 7;

/// User service errors
#[derive(Debug, Error)]
pub enum UserServiceError {
    /// Bad credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Registration request
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Login request; the identifier may be a username or an email
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    #[serde(alias = "username", alias = "email")]
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_days: DEFAULT_SESSION_DAYS,
        }
    }

    pub fn with_session_days(mut self, days: i64) -> Self {
        self.session_days = days.max(1);
        self
    }

    /// Lifetime of newly issued sessions
    pub fn session_lifetime(&self) -> anyhow::Result<Duration> {
        Duration::try_days(self.session_days)
            .ok_or_else(|| anyhow::anyhow!("Session lifetime of {} days is out of range", self.session_days))
    }

    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim();
        let email = input.email.trim();

        if username.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username cannot be empty".to_string(),
            ));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(UserServiceError::ValidationError(format!(
                "Username must be at most {} characters",
                MAX_USERNAME_LEN
            )));
        }
        if !email.contains('@') {
            return Err(UserServiceError::ValidationError(
                "Invalid email address".to_string(),
            ));
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        if self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is taken",
                username
            )));
        }
        if self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let password_hash = hash_password(&input.password)?;
        let user = User::new(username.to_string(), email.to_string(), password_hash, false);

        // a concurrent registration can still win the insert race
        let user = match self.user_repo.register(&user).await {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => {
                return Err(UserServiceError::UserExists(format!(
                    "Username '{}' or email '{}' is already registered",
                    username, email
                )));
            }
            Err(e) => return Err(e.context("Failed to create user").into()),
        };
        tracing::info!(user_id = user.id, username = %user.username, superuser = user.is_superuser, "User registered");
        Ok(user)
    }

    /// Verify credentials and open a session
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        if let Err(e) = self.session_repo.delete_expired().await {
            tracing::warn!(error = %e, "Failed to purge expired sessions");
        }

        let invalid = || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .find_user(input.username_or_email.trim())
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::debug!(user_id = user.id, "Password mismatch");
            return Err(invalid());
        }

        let session = Session::issue(user.id, self.session_lifetime()?)
            .context("Failed to issue session")?;
        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(session)
    }

    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// User owning a live session. Expired sessions are deleted and ignored.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!(error = %e, "Failed to delete expired session");
            }
            return Ok(None);
        }

        Ok(self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound(id))
    }

    /// Effective permissions: everything for superusers, grants otherwise
    pub async fn permissions(&self, user: &User) -> Result<Vec<Permission>, UserServiceError> {
        if user.is_superuser {
            return Ok(Permission::ALL.to_vec());
        }
        Ok(self
            .user_repo
            .permissions(user.id)
            .await
            .context("Failed to load permissions")?)
    }

    pub async fn has_permission(
        &self,
        user: &User,
        permission: Permission,
    ) -> Result<bool, UserServiceError> {
        if user.is_superuser {
            return Ok(true);
        }
        Ok(self.permissions(user).await?.contains(&permission))
    }

    pub async fn grant_permission(
        &self,
        user_id: i64,
        permission: Permission,
    ) -> Result<(), UserServiceError> {
        self.get_by_id(user_id).await?;
        self.user_repo
            .grant_permission(user_id, permission)
            .await
            .context("Failed to grant permission")?;
        tracing::info!(user_id, permission = %permission, "Permission granted");
        Ok(())
    }

    async fn find_user(&self, username_or_email: &str) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(username_or_email)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }
        Ok(self
            .user_repo
            .get_by_email(username_or_email)
            .await
            .context("Failed to get user by email")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup() -> UserService {
        setup_with_pool().await.1
    }

    async fn setup_with_pool() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    fn input(username: &str) -> RegisterInput {
        RegisterInput::new(username, format!("{}@example.com", username), "password123")
    }

    #[tokio::test]
    async fn test_first_user_is_superuser() {
        let service = setup().await;
        let first = service.register(input("admin")).await.unwrap();
        let second = service.register(input("reader")).await.unwrap();

        assert!(first.is_superuser);
        assert!(!second.is_superuser);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = setup().await;

        let cases = [
            RegisterInput::new("  ", "a@example.com", "password123"),
            RegisterInput::new("x".repeat(51), "a@example.com", "password123"),
            RegisterInput::new("alice", "not-an-email", "password123"),
            RegisterInput::new("alice", "a@example.com", "short"),
        ];
        for case in cases {
            assert!(matches!(
                service.register(case).await,
                Err(UserServiceError::ValidationError(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_register_duplicates() {
        let service = setup().await;
        service.register(input("alice")).await.unwrap();

        let same_name = RegisterInput::new("alice", "other@example.com", "password123");
        assert!(matches!(
            service.register(same_name).await,
            Err(UserServiceError::UserExists(_))
        ));

        let same_email = RegisterInput::new("bob", "alice@example.com", "password123");
        assert!(matches!(
            service.register(same_email).await,
            Err(UserServiceError::UserExists(_))
        ));
    }

    /// Lookups that miss rows inserted by a concurrent registration
    struct StaleLookups(Arc<dyn UserRepository>);

    #[async_trait::async_trait]
    impl UserRepository for StaleLookups {
        async fn create(&self, user: &User) -> anyhow::Result<User> {
            self.0.create(user).await
        }
        async fn register(&self, user: &User) -> anyhow::Result<User> {
            self.0.register(user).await
        }
        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
            self.0.get_by_id(id).await
        }
        async fn get_by_username(&self, _username: &str) -> anyhow::Result<Option<User>> {
            Ok(None)
        }
        async fn get_by_email(&self, _email: &str) -> anyhow::Result<Option<User>> {
            Ok(None)
        }
        async fn grant_permission(&self, user_id: i64, permission: Permission) -> anyhow::Result<()> {
            self.0.grant_permission(user_id, permission).await
        }
        async fn permissions(&self, user_id: i64) -> anyhow::Result<Vec<Permission>> {
            self.0.permissions(user_id).await
        }
    }

    #[tokio::test]
    async fn test_register_race_reports_user_exists() {
        let (pool, _service) = setup_with_pool().await;
        let service = UserService::new(
            Arc::new(StaleLookups(SqlxUserRepository::boxed(pool.clone()))),
            SqlxSessionRepository::boxed(pool.clone()),
        );
        let first = service.register(input("alice")).await.unwrap();
        assert!(first.is_superuser);

        let same_name = RegisterInput::new("alice", "other@example.com", "password123");
        assert!(matches!(
            service.register(same_name).await,
            Err(UserServiceError::UserExists(_))
        ));
        let same_email = RegisterInput::new("bob", "alice@example.com", "password123");
        assert!(matches!(
            service.register(same_email).await,
            Err(UserServiceError::UserExists(_))
        ));

        let second = service.register(input("carol")).await.unwrap();
        assert!(!second.is_superuser);
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let service = setup().await;
        let user = service.register(input("alice")).await.unwrap();

        let by_name = service.login(LoginInput::new("alice", "password123")).await.unwrap();
        let by_email = service
            .login(LoginInput::new("alice@example.com", "password123"))
            .await
            .unwrap();
        assert_ne!(by_name.id, by_email.id);

        let current = service.validate_session(&by_name.id).await.unwrap().unwrap();
        assert_eq!(current.id, user.id);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let service = setup().await;
        service.register(input("alice")).await.unwrap();

        assert!(matches!(
            service.login(LoginInput::new("alice", "wrong-password")).await,
            Err(UserServiceError::AuthenticationError(_))
        ));
        assert!(matches!(
            service.login(LoginInput::new("nobody", "password123")).await,
            Err(UserServiceError::AuthenticationError(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let service = setup().await;
        service.register(input("alice")).await.unwrap();
        let session = service.login(LoginInput::new("alice", "password123")).await.unwrap();

        service.logout(&session.id).await.unwrap();

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let service = setup().await;
        assert!(service.validate_session("bogus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_permissions() {
        let service = setup().await;
        let admin = service.register(input("admin")).await.unwrap();
        let editor = service.register(input("editor")).await.unwrap();

        assert!(service.has_permission(&admin, Permission::DeletePost).await.unwrap());
        assert_eq!(service.permissions(&admin).await.unwrap().len(), Permission::ALL.len());

        assert!(!service.has_permission(&editor, Permission::AddPost).await.unwrap());
        service.grant_permission(editor.id, Permission::AddPost).await.unwrap();
        assert!(service.has_permission(&editor, Permission::AddPost).await.unwrap());
        assert!(!service.has_permission(&editor, Permission::DeletePost).await.unwrap());
    }

    #[tokio::test]
    async fn test_grant_to_missing_user() {
        let service = setup().await;
        assert!(matches!(
            service.grant_permission(99, Permission::AddPost).await,
            Err(UserServiceError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_deleted_and_ignored() {
        let (pool, service) = setup_with_pool().await;
        let user = service.register(input("alice")).await.unwrap();

        let sessions = SqlxSessionRepository::new(pool);
        let stale = Session::issue(user.id, Duration::seconds(-60)).unwrap();
        sessions.create(&stale).await.unwrap();

        assert!(service.validate_session(&stale.id).await.unwrap().is_none());
        assert!(sessions.get_by_id(&stale.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_session_lifetime_fails_login_without_panicking() {
        let (pool, service) = setup_with_pool().await;
        service.register(input("alice")).await.unwrap();

        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
        .with_session_days(100_000_000);

        assert!(matches!(
            service.login(LoginInput::new("alice", "password123")).await,
            Err(UserServiceError::InternalError(_))
        ));
    }
}
