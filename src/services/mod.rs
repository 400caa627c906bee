//! Services layer
//!
//! Business rules on top of the repositories: validation, pagination,
//! caching, sessions and permission checks.

pub mod category;
pub mod password;
pub mod post;
pub mod user;

pub use category::{CategoryListing, CategoryService, CategoryServiceError, SUBSCRIBED_MESSAGE};
pub use password::{hash_password, verify_password};
pub use post::{PostForm, PostService, PostServiceError};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
