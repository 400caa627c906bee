//! Category repository
//!
//! Categories and their subscriber sets. Subscriptions live in the
//! `category_subscribers` join table keyed by (category, user), so adding an
//! existing subscriber is a no-op.

use crate::db::{Backend, DynDatabasePool};
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, name: &str) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// All categories ordered by name
    async fn list(&self) -> Result<Vec<Category>>;

    /// Add a subscriber. Returns false when the user was already subscribed.
    async fn add_subscriber(&self, category_id: i64, user_id: i64) -> Result<bool>;

    async fn is_subscriber(&self, category_id: i64, user_id: i64) -> Result<bool>;

    async fn count_subscribers(&self, category_id: i64) -> Result<i64>;
}

/// SQLx-backed category repository
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, name: &str) -> Result<Category> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_category_sqlite(pool, name).await,
            Backend::Mysql(pool) => create_category_mysql(pool, name).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = "SELECT id, name, created_at FROM categories WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get category by ID")?;
                Ok(row.map(|row| row_to_category_sqlite(&row)))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get category by ID")?;
                Ok(row.map(|row| row_to_category_mysql(&row)))
            }
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        let sql = "SELECT id, name, created_at FROM categories WHERE name = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(sql)
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get category by name")?;
                Ok(row.map(|row| row_to_category_sqlite(&row)))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(sql)
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get category by name")?;
                Ok(row.map(|row| row_to_category_mysql(&row)))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let sql = "SELECT id, name, created_at FROM categories ORDER BY name, id";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list categories")?;
                Ok(rows.iter().map(row_to_category_sqlite).collect())
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list categories")?;
                Ok(rows.iter().map(row_to_category_mysql).collect())
            }
        }
    }

    async fn add_subscriber(&self, category_id: i64, user_id: i64) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => add_subscriber_sqlite(pool, category_id, user_id).await,
            Backend::Mysql(pool) => add_subscriber_mysql(pool, category_id, user_id).await,
        }
    }

    async fn is_subscriber(&self, category_id: i64, user_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM category_subscribers WHERE category_id = ? AND user_id = ?";
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query_scalar(sql)
                .bind(category_id)
                .bind(user_id)
                .fetch_one(pool)
                .await
                .context("Failed to check subscription")?,
            Backend::Mysql(pool) => sqlx::query_scalar(sql)
                .bind(category_id)
                .bind(user_id)
                .fetch_one(pool)
                .await
                .context("Failed to check subscription")?,
        };
        Ok(count > 0)
    }

    async fn count_subscribers(&self, category_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM category_subscribers WHERE category_id = ?";
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query_scalar(sql)
                .bind(category_id)
                .fetch_one(pool)
                .await
                .context("Failed to count subscribers")?,
            Backend::Mysql(pool) => sqlx::query_scalar(sql)
                .bind(category_id)
                .fetch_one(pool)
                .await
                .context("Failed to count subscribers")?,
        };
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_category_sqlite(pool: &SqlitePool, name: &str) -> Result<Category> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO categories (name, created_at) VALUES (?, ?)")
        .bind(name)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_rowid(),
        name: name.to_string(),
        created_at: now,
    })
}

async fn add_subscriber_sqlite(pool: &SqlitePool, category_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO category_subscribers (category_id, user_id, created_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(category_id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to add subscriber")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_category_mysql(pool: &MySqlPool, name: &str) -> Result<Category> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO categories (name, created_at) VALUES (?, ?)")
        .bind(name)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_id() as i64,
        name: name.to_string(),
        created_at: now,
    })
}

async fn add_subscriber_mysql(pool: &MySqlPool, category_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT IGNORE INTO category_subscribers (category_id, user_id, created_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(category_id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to add subscriber")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}
