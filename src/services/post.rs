//! Post service
//!
//! Filtered, paginated listing; cache-aside detail reads; validated create,
//! update and delete. Updates and deletes invalidate the post's cache entry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;

use crate::cache::{post_key, Cache, CacheLayer};
use crate::db::repositories::{CategoryRepository, PostRepository};
use crate::models::{
    CreatePostInput, ListParams, PageNumber, PagedResult, Post, PostFilter, PostKind,
    UpdatePostInput, MAX_TITLE_LEN, PAGE_SIZE,
};

/// Post service errors
#[derive(Debug, Error)]
pub enum PostServiceError {
    #[error("Post not found: {0}")]
    NotFound(i64),

    /// Requested page lies outside the result
    #[error("Invalid page")]
    PageNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Title, text and category as submitted by the client
#[derive(Debug, Clone)]
pub struct PostForm {
    pub title: String,
    pub text: String,
    pub category_id: i64,
}

pub struct PostService {
    repo: Arc<dyn PostRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
    cache_ttl: Option<Duration>,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            repo,
            category_repo,
            cache,
            cache_ttl: None,
        }
    }

    /// Expire cached posts after `ttl` instead of keeping them until invalidated
    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Fetch a post, reading through the cache.
    ///
    /// Cache failures are logged and fall back to the database.
    pub async fn get_by_id(&self, id: i64) -> Result<Post, PostServiceError> {
        let key = post_key(id);

        match self.cache.get::<Post>(&key).await {
            Ok(Some(post)) => {
                tracing::debug!(post_id = id, "Post cache hit");
                return Ok(post);
            }
            Ok(None) => tracing::debug!(post_id = id, "Post cache miss"),
            Err(e) => tracing::warn!(post_id = id, error = %e, "Post cache read failed"),
        }

        let post = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to load post")?
            .ok_or(PostServiceError::NotFound(id))?;

        if let Err(e) = self.cache.set(&key, &post, self.cache_ttl).await {
            tracing::warn!(post_id = id, error = %e, "Post cache write failed");
        }

        Ok(post)
    }

    /// One page of posts matching `filter`, newest first
    pub async fn list(
        &self,
        filter: &PostFilter,
        page: PageNumber,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        paginate(self.repo.as_ref(), filter, page).await
    }

    /// Create a post authored by `author_id`
    pub async fn create(
        &self,
        author_id: i64,
        form: PostForm,
        kind: PostKind,
    ) -> Result<Post, PostServiceError> {
        let title = validate_title(&form.title)?;
        let text = validate_text(&form.text)?;
        self.ensure_category(form.category_id).await?;

        let input = CreatePostInput::new(title, text, form.category_id, author_id).with_kind(kind);
        let post = self.repo.create(&input).await.context("Failed to create post")?;

        tracing::info!(post_id = post.id, kind = %post.kind, author_id, "Post created");
        Ok(post)
    }

    /// Apply a partial update. Kind and author are left untouched.
    pub async fn update(
        &self,
        id: i64,
        input: UpdatePostInput,
    ) -> Result<Post, PostServiceError> {
        let existing = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to load post")?
            .ok_or(PostServiceError::NotFound(id))?;

        let input = UpdatePostInput {
            title: input.title.as_deref().map(validate_title).transpose()?,
            text: input.text.as_deref().map(validate_text).transpose()?,
            category_id: input.category_id,
        };
        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
        }

        let (title, text, category_id) = input.apply_to(&existing);
        let post = self
            .repo
            .update(&Post {
                title,
                text,
                category_id,
                ..existing
            })
            .await
            .context("Failed to update post")?;

        self.invalidate(id).await;
        tracing::info!(post_id = id, "Post updated");
        Ok(post)
    }

    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete post")?;
        if !deleted {
            return Err(PostServiceError::NotFound(id));
        }

        self.invalidate(id).await;
        tracing::info!(post_id = id, "Post deleted");
        Ok(())
    }

    async fn ensure_category(&self, category_id: i64) -> Result<(), PostServiceError> {
        let exists = self
            .category_repo
            .get_by_id(category_id)
            .await
            .context("Failed to load category")?
            .is_some();
        if exists {
            Ok(())
        } else {
            Err(PostServiceError::ValidationError(format!(
                "Category {} does not exist",
                category_id
            )))
        }
    }

    async fn invalidate(&self, id: i64) {
        if let Err(e) = self.cache.delete(&post_key(id)).await {
            tracing::warn!(post_id = id, error = %e, "Post cache invalidation failed");
        }
    }
}

/// Resolve `page` against the filtered result and load that page
pub(crate) async fn paginate(
    repo: &dyn PostRepository,
    filter: &PostFilter,
    page: PageNumber,
) -> Result<PagedResult<Post>, PostServiceError> {
    let total = repo.count(filter).await.context("Failed to count posts")?;
    let page = page
        .resolve(total, PAGE_SIZE)
        .ok_or(PostServiceError::PageNotFound)?;

    let params = ListParams::new(page, PAGE_SIZE);
    let items = repo
        .list(filter, &params)
        .await
        .context("Failed to list posts")?;

    Ok(PagedResult::new(items, total, &params))
}

fn validate_title(title: &str) -> Result<String, PostServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PostServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(PostServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

fn validate_text(text: &str) -> Result<String, PostServiceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PostServiceError::ValidationError(
            "Text cannot be empty".to_string(),
        ));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxPostRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Delegating repository that counts detail lookups
    struct CountingRepo {
        inner: SqlxPostRepository,
        gets: AtomicUsize,
    }

    #[async_trait]
    impl PostRepository for CountingRepo {
        async fn create(&self, input: &CreatePostInput) -> anyhow::Result<Post> {
            self.inner.create(input).await
        }
        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Post>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get_by_id(id).await
        }
        async fn update(&self, post: &Post) -> anyhow::Result<Post> {
            self.inner.update(post).await
        }
        async fn delete(&self, id: i64) -> anyhow::Result<bool> {
            self.inner.delete(id).await
        }
        async fn list(&self, filter: &PostFilter, params: &ListParams) -> anyhow::Result<Vec<Post>> {
            self.inner.list(filter, params).await
        }
        async fn count(&self, filter: &PostFilter) -> anyhow::Result<i64> {
            self.inner.count(filter).await
        }
    }

    struct Fixture {
        service: PostService,
        repo: Arc<CountingRepo>,
        cache: Arc<Cache>,
        author_id: i64,
        category_id: i64,
    }

    async fn setup() -> Fixture {
        setup_with_ttl(None).await
    }

    async fn setup_with_ttl(ttl: Option<Duration>) -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let author_id = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "editor".to_string(),
                "editor@example.com".to_string(),
                "hash".to_string(),
                false,
            ))
            .await
            .unwrap()
            .id;
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let category_id = category_repo.create("World").await.unwrap().id;

        let repo = Arc::new(CountingRepo {
            inner: SqlxPostRepository::new(pool),
            gets: AtomicUsize::new(0),
        });
        let cache = Arc::new(Cache::Memory(MemoryCache::new()));
        let service =
            PostService::new(repo.clone(), category_repo, cache.clone()).with_cache_ttl(ttl);

        Fixture {
            service,
            repo,
            cache,
            author_id,
            category_id,
        }
    }

    fn form(title: &str, category_id: i64) -> PostForm {
        PostForm {
            title: title.to_string(),
            text: "Body text".to_string(),
            category_id,
        }
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let fx = setup().await;
        let post = fx
            .service
            .create(fx.author_id, form("Cached", fx.category_id), PostKind::News)
            .await
            .unwrap();

        let first = fx.service.get_by_id(post.id).await.unwrap();
        let second = fx.service.get_by_id(post.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.repo.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreadable_cache_entry_falls_back_to_database() {
        let fx = setup().await;
        let post = fx
            .service
            .create(fx.author_id, form("Fallback", fx.category_id), PostKind::News)
            .await
            .unwrap();
        fx.cache.set(&post_key(post.id), &"not a post", None).await.unwrap();

        let found = fx.service.get_by_id(post.id).await.unwrap();
        assert_eq!(found.title, "Fallback");
        assert_eq!(fx.repo.gets.load(Ordering::SeqCst), 1);

        let rewritten: Option<Post> = fx.cache.get(&post_key(post.id)).await.unwrap();
        assert_eq!(rewritten, Some(found));
    }

    #[tokio::test]
    async fn test_configured_ttl_expires_cached_post() {
        let fx = setup_with_ttl(Some(Duration::from_millis(50))).await;
        let post = fx
            .service
            .create(fx.author_id, form("Short lived", fx.category_id), PostKind::News)
            .await
            .unwrap();

        fx.service.get_by_id(post.id).await.unwrap();
        fx.service.get_by_id(post.id).await.unwrap();
        assert_eq!(fx.repo.gets.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        fx.service.get_by_id(post.id).await.unwrap();
        assert_eq!(fx.repo.gets.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_post_is_not_found() {
        let fx = setup().await;
        let err = fx.service.get_by_id(404).await.unwrap_err();
        assert!(matches!(err, PostServiceError::NotFound(404)));
    }

    #[tokio::test]
    async fn test_kind_follows_entry_point() {
        let fx = setup().await;
        let news = fx
            .service
            .create(fx.author_id, form("News", fx.category_id), PostKind::default())
            .await
            .unwrap();
        let article = fx
            .service
            .create(fx.author_id, form("Article", fx.category_id), PostKind::Article)
            .await
            .unwrap();

        assert_eq!(news.kind, PostKind::News);
        assert_eq!(article.kind, PostKind::Article);
        assert_eq!(article.author_id, fx.author_id);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let fx = setup().await;

        let blank = fx
            .service
            .create(fx.author_id, form("   ", fx.category_id), PostKind::News)
            .await;
        assert!(matches!(blank, Err(PostServiceError::ValidationError(_))));

        let long = fx
            .service
            .create(fx.author_id, form(&"x".repeat(256), fx.category_id), PostKind::News)
            .await;
        assert!(matches!(long, Err(PostServiceError::ValidationError(_))));

        let no_category = fx
            .service
            .create(fx.author_id, form("Title", 999), PostKind::News)
            .await;
        assert!(matches!(no_category, Err(PostServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_create_trims_fields() {
        let fx = setup().await;
        let post = fx
            .service
            .create(fx.author_id, form("  Spaced  ", fx.category_id), PostKind::News)
            .await
            .unwrap();
        assert_eq!(post.title, "Spaced");
    }

    #[tokio::test]
    async fn test_update_invalidates_cache() {
        let fx = setup().await;
        let post = fx
            .service
            .create(fx.author_id, form("Before", fx.category_id), PostKind::Article)
            .await
            .unwrap();
        fx.service.get_by_id(post.id).await.unwrap();

        let updated = fx
            .service
            .update(post.id, UpdatePostInput::new().with_title("After"))
            .await
            .unwrap();
        assert_eq!(updated.title, "After");
        assert_eq!(updated.kind, PostKind::Article);

        let fetched = fx.service.get_by_id(post.id).await.unwrap();
        assert_eq!(fetched.title, "After");
        assert_eq!(fetched.text, "Body text");
    }

    #[tokio::test]
    async fn test_update_missing_post_before_validation() {
        let fx = setup().await;
        let err = fx
            .service
            .update(999, UpdatePostInput::new().with_title(""))
            .await
            .unwrap_err();
        assert!(matches!(err, PostServiceError::NotFound(999)));
    }

    #[tokio::test]
    async fn test_update_rejects_blank_text() {
        let fx = setup().await;
        let post = fx
            .service
            .create(fx.author_id, form("Title", fx.category_id), PostKind::News)
            .await
            .unwrap();
        let err = fx
            .service
            .update(post.id, UpdatePostInput::new().with_text("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, PostServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_delete_then_detail_is_not_found() {
        let fx = setup().await;
        let post = fx
            .service
            .create(fx.author_id, form("Doomed", fx.category_id), PostKind::News)
            .await
            .unwrap();
        fx.service.get_by_id(post.id).await.unwrap();

        fx.service.delete(post.id).await.unwrap();

        assert!(matches!(
            fx.service.get_by_id(post.id).await,
            Err(PostServiceError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.delete(post.id).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_pages() {
        let fx = setup().await;
        for i in 0..12 {
            fx.service
                .create(fx.author_id, form(&format!("Post {}", i), fx.category_id), PostKind::News)
                .await
                .unwrap();
        }
        let filter = PostFilter::new();

        let first = fx.service.list(&filter, PageNumber::Number(1)).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total, 12);
        assert!(first.has_next());

        let last = fx.service.list(&filter, PageNumber::Last).await.unwrap();
        assert_eq!(last.page, 2);
        assert_eq!(last.items.len(), 2);

        assert!(matches!(
            fx.service.list(&filter, PageNumber::Number(3)).await,
            Err(PostServiceError::PageNotFound)
        ));
    }

    #[tokio::test]
    async fn test_empty_list_first_page() {
        let fx = setup().await;
        let page = fx
            .service
            .list(&PostFilter::new().with_title("nothing"), PageNumber::default())
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages(), 1);
    }
}
