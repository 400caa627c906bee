//! Post model
//!
//! A post is either a short news item (the default) or a long-form article.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum title length accepted by the posts table
pub const MAX_TITLE_LEN: usize = 255;

/// Post entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub kind: PostKind,
    pub category_id: i64,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Type tag of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    #[default]
    News,
    Article,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::News => "news",
            PostKind::Article => "article",
        }
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "news" | "n" => Ok(PostKind::News),
            "article" | "a" => Ok(PostKind::Article),
            _ => Err(anyhow::anyhow!("Invalid post kind: {}", s)),
        }
    }
}

/// Input for creating a post
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub title: String,
    pub text: String,
    pub category_id: i64,
    pub author_id: i64,
    pub kind: PostKind,
}

impl CreatePostInput {
    /// New input with the default kind
    pub fn new(
        title: impl Into<String>,
        text: impl Into<String>,
        category_id: i64,
        author_id: i64,
    ) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            category_id,
            author_id,
            kind: PostKind::default(),
        }
    }

    pub fn with_kind(mut self, kind: PostKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Partial update of a post. Kind and author are fixed at creation.
#[derive(Debug, Clone, Default)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub text: Option<String>,
    pub category_id: Option<i64>,
}

impl UpdatePostInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Apply the update on top of an existing post
    pub fn apply_to(&self, post: &Post) -> (String, String, i64) {
        (
            self.title.clone().unwrap_or_else(|| post.title.clone()),
            self.text.clone().unwrap_or_else(|| post.text.clone()),
            self.category_id.unwrap_or(post.category_id),
        )
    }
}
