//! Data models
//!
//! Entities persisted by the repositories plus the input, filter and
//! pagination types the services exchange with the API layer.

mod category;
mod filter;
mod pagination;
mod post;
mod session;
mod user;

pub use category::{Category, Subscription, MAX_CATEGORY_NAME_LEN};
pub use filter::{fold_title, PostFilter, LIKE_ESCAPE};
pub use pagination::{page_count, ListParams, PageNumber, PagedResult, PAGE_SIZE};
pub use post::{CreatePostInput, Post, PostKind, UpdatePostInput, MAX_TITLE_LEN};
pub use session::Session;
pub use user::{Permission, User};
