//! User repository
//!
//! Accounts and their granted permissions.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Permission, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user whose password is already hashed
    async fn create(&self, user: &User) -> Result<User>;

    /// Insert a self-registered user. The account becomes superuser exactly
    /// when the table was empty, decided by the insert statement itself.
    async fn register(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Grant a permission. Granting twice is a no-op.
    async fn grant_permission(&self, user_id: i64, permission: Permission) -> Result<()>;

    /// Permissions explicitly granted to a user (superuser status not included)
    async fn permissions(&self, user_id: i64) -> Result<Vec<Permission>>;
}

/// SQLx-backed user repository
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

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, user).await,
            Backend::Mysql(pool) => create_user_mysql(pool, user).await,
        }
    }

    async fn register(&self, user: &User) -> Result<User> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => register_user_sqlite(pool, user).await?,
            Backend::Mysql(pool) => register_user_mysql(pool, user).await?,
        };
        self.get_by_id(id)
            .await?
            .with_context(|| format!("Registered user {} vanished", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_sqlite(pool, "id = ?", UserKey::Id(id)).await,
            Backend::Mysql(pool) => get_user_mysql(pool, "id = ?", UserKey::Id(id)).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let key = UserKey::Text(username);
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_sqlite(pool, "username = ?", key).await,
            Backend::Mysql(pool) => get_user_mysql(pool, "username = ?", key).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let key = UserKey::Text(email);
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_sqlite(pool, "email = ?", key).await,
            Backend::Mysql(pool) => get_user_mysql(pool, "email = ?", key).await,
        }
    }

    async fn grant_permission(&self, user_id: i64, permission: Permission) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query("INSERT OR IGNORE INTO user_permissions (user_id, codename) VALUES (?, ?)")
                    .bind(user_id)
                    .bind(permission.codename())
                    .execute(pool)
                    .await
                    .context("Failed to grant permission")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query("INSERT IGNORE INTO user_permissions (user_id, codename) VALUES (?, ?)")
                    .bind(user_id)
                    .bind(permission.codename())
                    .execute(pool)
                    .await
                    .context("Failed to grant permission")?;
            }
        }
        Ok(())
    }

    async fn permissions(&self, user_id: i64) -> Result<Vec<Permission>> {
        let sql = "SELECT codename FROM user_permissions WHERE user_id = ? ORDER BY codename";
        let codenames: Vec<String> = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query_scalar(sql)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to load permissions")?,
            Backend::Mysql(pool) => sqlx::query_scalar(sql)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to load permissions")?,
        };

        Ok(codenames
            .iter()
            .filter_map(|codename| match codename.parse() {
                Ok(permission) => Some(permission),
                Err(_) => {
                    tracing::warn!(user_id, codename = %codename, "Ignoring unknown permission");
                    None
                }
            })
            .collect())
    }
}

/// Lookup value for single-user queries
#[derive(Clone, Copy)]
enum UserKey<'a> {
    Id(i64),
    Text(&'a str),
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, is_superuser, created_at, updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, is_superuser, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.is_superuser)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn register_user_sqlite(pool: &SqlitePool, user: &User) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, is_superuser, created_at, updated_at)
        SELECT ?, ?, ?, NOT EXISTS (SELECT 1 FROM users), ?, ?
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to register user")?;

    Ok(result.last_insert_rowid())
}

async fn get_user_sqlite(
    pool: &SqlitePool,
    condition: &str,
    key: UserKey<'_>,
) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Text(text) => query.bind(text),
    };
    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    Ok(row.map(|row| row_to_user_sqlite(&row)))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_superuser: row.get("is_superuser"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, is_superuser, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.is_superuser)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn register_user_mysql(pool: &MySqlPool, user: &User) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, is_superuser, created_at, updated_at)
        SELECT ?, ?, ?, NOT EXISTS (SELECT 1 FROM users), ?, ?
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to register user")?;

    Ok(result.last_insert_id() as i64)
}

async fn get_user_mysql(
    pool: &MySqlPool,
    condition: &str,
    key: UserKey<'_>,
) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Text(text) => query.bind(text),
    };
    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

    Ok(row.map(|row| row_to_user_mysql(&row)))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_superuser: row.get("is_superuser"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
