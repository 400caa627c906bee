//! Category service
//!
//! Category catalogue, per-category post listings and subscriptions.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use thiserror::Error;

use super::post::{paginate, PostServiceError};
use crate::db::is_unique_violation;
use crate::db::repositories::{CategoryRepository, PostRepository};
use crate::models::{
    Category, PageNumber, PagedResult, Post, PostFilter, User, MAX_CATEGORY_NAME_LEN,
};

/// Message returned after subscribing
pub const SUBSCRIBED_MESSAGE: &str = "You have successfully subscribed to the category:";

/// Category service errors
#[derive(Debug, Error)]
pub enum CategoryServiceError {
    #[error("Category not found: {0}")]
    NotFound(i64),

    #[error("Invalid page")]
    PageNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Category already exists: {0}")]
    DuplicateName(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<PostServiceError> for CategoryServiceError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::PageNotFound => CategoryServiceError::PageNotFound,
            PostServiceError::ValidationError(msg) => CategoryServiceError::ValidationError(msg),
            PostServiceError::NotFound(id) => {
                CategoryServiceError::InternalError(anyhow::anyhow!("Post {} vanished", id))
            }
            PostServiceError::InternalError(e) => CategoryServiceError::InternalError(e),
        }
    }
}

/// A category page: its posts plus subscription details for the viewer
#[derive(Debug, Clone, Serialize)]
pub struct CategoryListing {
    pub category: Category,
    pub posts: PagedResult<Post>,
    pub subscriber_count: i64,
    /// True unless the viewer is signed in and subscribed
    pub is_not_subscriber: bool,
}

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    post_repo: Arc<dyn PostRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, post_repo: Arc<dyn PostRepository>) -> Self {
        Self { repo, post_repo }
    }

    /// All categories ordered by name
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self.repo.list().await.context("Failed to list categories")?)
    }

    pub async fn get(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to load category")?
            .ok_or(CategoryServiceError::NotFound(id))
    }

    pub async fn create(&self, name: &str) -> Result<Category, CategoryServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CategoryServiceError::ValidationError(
                "Category name cannot be empty".to_string(),
            ));
        }
        if name.chars().count() > MAX_CATEGORY_NAME_LEN {
            return Err(CategoryServiceError::ValidationError(format!(
                "Category name must be at most {} characters",
                MAX_CATEGORY_NAME_LEN
            )));
        }
        if self
            .repo
            .get_by_name(name)
            .await
            .context("Failed to check category name")?
            .is_some()
        {
            return Err(CategoryServiceError::DuplicateName(name.to_string()));
        }

        let category = match self.repo.create(name).await {
            Ok(category) => category,
            Err(e) if is_unique_violation(&e) => {
                return Err(CategoryServiceError::DuplicateName(name.to_string()));
            }
            Err(e) => return Err(e.context("Failed to create category").into()),
        };
        tracing::info!(category_id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    /// Add `user` to the category's subscribers. Repeating is harmless.
    pub async fn subscribe(
        &self,
        id: i64,
        user: &User,
    ) -> Result<Category, CategoryServiceError> {
        let category = self.get(id).await?;
        let added = self
            .repo
            .add_subscriber(id, user.id)
            .await
            .context("Failed to add subscriber")?;

        if added {
            tracing::info!(category_id = id, user_id = user.id, "User subscribed");
        } else {
            tracing::debug!(category_id = id, user_id = user.id, "User already subscribed");
        }
        Ok(category)
    }

    /// Posts of one category with the viewer's subscription state
    pub async fn listing(
        &self,
        id: i64,
        viewer: Option<&User>,
        page: PageNumber,
    ) -> Result<CategoryListing, CategoryServiceError> {
        let category = self.get(id).await?;

        let filter = PostFilter::new().with_category(id);
        let posts = paginate(self.post_repo.as_ref(), &filter, page).await?;

        let subscriber_count = self
            .repo
            .count_subscribers(id)
            .await
            .context("Failed to count subscribers")?;

        let is_subscriber = match viewer {
            Some(user) => self
                .repo
                .is_subscriber(id, user.id)
                .await
                .context("Failed to check subscription")?,
            None => false,
        };

        Ok(CategoryListing {
            category,
            posts,
            subscriber_count,
            is_not_subscriber: !is_subscriber,
        })
    }
}
