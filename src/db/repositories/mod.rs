//! Database repositories
//!
//! One repository per aggregate. Each exposes an `async_trait` interface and
//! an SQLx implementation that runs driver-specific SQL.

pub mod category;
pub mod post;
pub mod session;
pub mod user;

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
