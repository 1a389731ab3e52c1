//! Data models for Libris

pub mod author;
pub mod book;
pub mod borrow;
pub mod category;
pub mod user;

// Re-export commonly used types
pub use author::Author;
pub use book::{Book, Inventory};
pub use borrow::{BookBorrow, BorrowDetails, BorrowStatus};
pub use category::Category;
pub use user::{Role, User, UserClaims, UserShort};

/// Default and maximum page sizes for list endpoints
pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// Normalize `page`/`per_page` query values into `(page, per_page, offset)`
pub fn paginate(page: Option<i64>, per_page: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    (page, per_page, (page - 1).saturating_mul(per_page))
}
