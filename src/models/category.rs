//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum category name length
pub const MAX_CATEGORY_NAME_LEN: usize = 64;

/// Topic grouping for posts. Names are unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Subscription of a user to a category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    pub category_id: i64,
    pub user_id: i64,
}
