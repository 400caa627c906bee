//! Post repository
//!
//! Posts are listed newest first (`created_at DESC, id DESC`). Filtering is
//! pushed down into SQL with [`QueryBuilder`], one condition per set
//! [`PostFilter`] criterion.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{
    fold_title, CreatePostInput, ListParams, Post, PostFilter, PostKind, LIKE_ESCAPE,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const POST_COLUMNS: &str =
    "id, title, text, kind, category_id, author_id, created_at, updated_at";

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, input: &CreatePostInput) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Persist title, text and category of an existing post, bumping `updated_at`
    async fn update(&self, post: &Post) -> Result<Post>;

    /// Delete a post. Returns false when no row matched.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// One page of posts matching the filter, newest first
    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<Vec<Post>>;

    /// Number of posts matching the filter
    async fn count(&self, filter: &PostFilter) -> Result<i64>;
}

/// SQLx-backed post repository
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, input: &CreatePostInput) -> Result<Post> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_post_sqlite(pool, input).await,
            Backend::Mysql(pool) => create_post_mysql(pool, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_post_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_post_by_id_mysql(pool, id).await,
        }
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_post_sqlite(pool, post).await,
            Backend::Mysql(pool) => update_post_mysql(pool, post).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, filter: &PostFilter, params: &ListParams) -> Result<Vec<Post>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_posts_sqlite(pool, filter, params).await,
            Backend::Mysql(pool) => list_posts_mysql(pool, filter, params).await,
        }
    }

    async fn count(&self, filter: &PostFilter) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts WHERE 1=1");
                push_filter_sqlite(&mut qb, filter);
                qb.build_query_scalar::<i64>()
                    .fetch_one(pool)
                    .await
                    .context("Failed to count posts")
            }
            Backend::Mysql(pool) => {
                let mut qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM posts WHERE 1=1");
                push_filter_mysql(&mut qb, filter);
                qb.build_query_scalar::<i64>()
                    .fetch_one(pool)
                    .await
                    .context("Failed to count posts")
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, input: &CreatePostInput) -> Result<Post> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, title_search, text, kind, category_id, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(fold_title(&input.title))
    .bind(&input.text)
    .bind(input.kind.as_str())
    .bind(input.category_id)
    .bind(input.author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        title: input.title.clone(),
        text: input.text.clone(),
        kind: input.kind,
        category_id: input.category_id,
        author_id: input.author_id,
        created_at: now,
        updated_at: now,
    })
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    row.map(|row| row_to_post_sqlite(&row)).transpose()
}

async fn update_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    let now = Utc::now();
    sqlx::query(
        "UPDATE posts SET title = ?, title_search = ?, text = ?, category_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&post.title)
    .bind(fold_title(&post.title))
    .bind(&post.text)
    .bind(post.category_id)
    .bind(now)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    Ok(Post {
        updated_at: now,
        ..post.clone()
    })
}

async fn list_posts_sqlite(
    pool: &SqlitePool,
    filter: &PostFilter,
    params: &ListParams,
) -> Result<Vec<Post>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM posts WHERE 1=1",
        POST_COLUMNS
    ));
    push_filter_sqlite(&mut qb, filter);
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    qb.push_bind(params.limit());
    qb.push(" OFFSET ");
    qb.push_bind(params.offset());

    let rows = qb
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    rows.iter().map(row_to_post_sqlite).collect()
}

fn push_filter_sqlite(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PostFilter) {
    if let Some(pattern) = filter.title_pattern() {
        qb.push(" AND title_search LIKE ");
        qb.push_bind(pattern);
        qb.push(format!(" ESCAPE '{}'", LIKE_ESCAPE));
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ");
        qb.push_bind(category_id);
    }
    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ");
        qb.push_bind(kind.as_str());
    }
    if let Some(author_id) = filter.author_id {
        qb.push(" AND author_id = ");
        qb.push_bind(author_id);
    }
    if let Some(from) = filter.created_from() {
        qb.push(" AND created_at >= ");
        qb.push_bind(from);
    }
    if let Some(until) = filter.created_until() {
        qb.push(" AND created_at < ");
        qb.push_bind(until);
    }
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let kind: String = row.get("kind");
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        text: row.get("text"),
        kind: PostKind::from_str(&kind)
            .with_context(|| format!("Invalid post kind in database: {}", kind))?,
        category_id: row.get("category_id"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, input: &CreatePostInput) -> Result<Post> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, title_search, text, kind, category_id, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(fold_title(&input.title))
    .bind(&input.text)
    .bind(input.kind.as_str())
    .bind(input.category_id)
    .bind(input.author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        title: input.title.clone(),
        text: input.text.clone(),
        kind: input.kind,
        category_id: input.category_id,
        author_id: input.author_id,
        created_at: now,
        updated_at: now,
    })
}

async fn get_post_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    row.map(|row| row_to_post_mysql(&row)).transpose()
}

async fn update_post_mysql(pool: &MySqlPool, post: &Post) -> Result<Post> {
    let now = Utc::now();
    sqlx::query(
        "UPDATE posts SET title = ?, title_search = ?, text = ?, category_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&post.title)
    .bind(fold_title(&post.title))
    .bind(&post.text)
    .bind(post.category_id)
    .bind(now)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    Ok(Post {
        updated_at: now,
        ..post.clone()
    })
}

async fn list_posts_mysql(
    pool: &MySqlPool,
    filter: &PostFilter,
    params: &ListParams,
) -> Result<Vec<Post>> {
    let mut qb = QueryBuilder::<MySql>::new(format!(
        "SELECT {} FROM posts WHERE 1=1",
        POST_COLUMNS
    ));
    push_filter_mysql(&mut qb, filter);
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    qb.push_bind(params.limit());
    qb.push(" OFFSET ");
    qb.push_bind(params.offset());

    let rows = qb
        .build()
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    rows.iter().map(row_to_post_mysql).collect()
}

fn push_filter_mysql(qb: &mut QueryBuilder<'_, MySql>, filter: &PostFilter) {
    if let Some(pattern) = filter.title_pattern() {
        qb.push(" AND title_search LIKE ");
        qb.push_bind(pattern);
        qb.push(format!(" ESCAPE '{}'", LIKE_ESCAPE));
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ");
        qb.push_bind(category_id);
    }
    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ");
        qb.push_bind(kind.as_str());
    }
    if let Some(author_id) = filter.author_id {
        qb.push(" AND author_id = ");
        qb.push_bind(author_id);
    }
    if let Some(from) = filter.created_from() {
        qb.push(" AND created_at >= ");
        qb.push_bind(from);
    }
    if let Some(until) = filter.created_until() {
        qb.push(" AND created_at < ");
        qb.push_bind(until);
    }
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    let kind: String = row.get("kind");
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        text: row.get("text"),
        kind: PostKind::from_str(&kind)
            .with_context(|| format!("Invalid post kind in database: {}", kind))?,
        category_id: row.get("category_id"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
