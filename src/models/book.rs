//! Book (catalog title) model and inventory counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Per-title copy counters.
///
/// `available + borrows == amount` holds for every value produced by the
/// methods below; the `books` table enforces the same rule with a CHECK
/// constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    /// Total owned copies
    pub amount: i32,
    /// Copies free to lend
    pub available: i32,
    /// Copies currently lent
    pub borrows: i32,
    /// Historical number of lends
    pub borrowed_times: i32,
}

impl Inventory {
    /// Fresh inventory for a newly catalogued title
    pub fn new(amount: i32) -> Self {
        Self {
            amount,
            available: amount,
            borrows: 0,
            borrowed_times: 0,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.available >= 0 && self.borrows >= 0 && self.available + self.borrows == self.amount
    }

    pub fn ensure_available(&self) -> AppResult<()> {
        if self.available > 0 {
            Ok(())
        } else {
            Err(AppError::BookUnavailable("No copy of this book is available".to_string()))
        }
    }

    /// Hand out one copy (accept)
    pub fn lend(&self) -> AppResult<Self> {
        self.ensure_available()?;
        Ok(Self {
            available: self.available - 1,
            borrows: self.borrows + 1,
            borrowed_times: self.borrowed_times + 1,
            ..*self
        })
    }

    /// Take one copy back (return)
    pub fn restore(&self) -> AppResult<Self> {
        if self.borrows <= 0 {
            return Err(AppError::Internal(
                "Returning a copy of a book with no recorded borrows".to_string(),
            ));
        }
        Ok(Self {
            available: self.available + 1,
            borrows: self.borrows - 1,
            ..*self
        })
    }

    /// Change the number of owned copies, keeping lent copies in place
    pub fn resize(&self, amount: i32) -> AppResult<Self> {
        if amount < self.borrows {
            return Err(AppError::Conflict(format!(
                "Cannot reduce amount to {} while {} copies are lent",
                amount, self.borrows
            )));
        }
        Ok(Self {
            amount,
            available: amount - self.borrows,
            ..*self
        })
    }
}

/// Book row from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    /// Cover image URL
    pub image: Option<String>,
    pub language: Option<String>,
    pub pages: Option<i32>,
    pub published_year: Option<i32>,
    pub author_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub amount: i32,
    pub available: i32,
    pub borrows: i32,
    pub borrowed_times: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn inventory(&self) -> Inventory {
        Inventory {
            amount: self.amount,
            available: self.available,
            borrows: self.borrows,
            borrowed_times: self.borrowed_times,
        }
    }

    pub fn apply_inventory(&mut self, inventory: Inventory) {
        self.amount = inventory.amount;
        self.available = inventory.available;
        self.borrows = inventory.borrows;
        self.borrowed_times = inventory.borrowed_times;
    }
}

/// Book search parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive title substring
    pub title: Option<String>,
    pub author_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    /// Only titles with at least one free copy
    pub available: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, max = 500, message = "Title must be 1-500 characters"))]
    pub title: String,
    #[validate(length(min = 10, max = 17, message = "ISBN must be 10-17 characters"))]
    pub isbn: Option<String>,
    pub description: Option<String>,
    #[validate(url(message = "Image must be a URL"))]
    pub image: Option<String>,
    #[validate(length(min = 2, max = 5, message = "Language code must be 2-5 characters"))]
    pub language: Option<String>,
    #[validate(range(min = 1, message = "Pages must be positive"))]
    pub pages: Option<i32>,
    pub published_year: Option<i32>,
    pub author_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    #[validate(range(min = 0, max = 100000, message = "Amount must be between 0 and 100000"))]
    pub amount: i32,
}

/// Update book request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 500, message = "Title must be 1-500 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 10, max = 17, message = "ISBN must be 10-17 characters"))]
    pub isbn: Option<String>,
    pub description: Option<String>,
    #[validate(url(message = "Image must be a URL"))]
    pub image: Option<String>,
    #[validate(length(min = 2, max = 5, message = "Language code must be 2-5 characters"))]
    pub language: Option<String>,
    #[validate(range(min = 1, message = "Pages must be positive"))]
    pub pages: Option<i32>,
    pub published_year: Option<i32>,
    pub author_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    /// New total of owned copies; `available` is re-derived from it
    #[validate(range(min = 0, max = 100000, message = "Amount must be between 0 and 100000"))]
    pub amount: Option<i32>,
}
