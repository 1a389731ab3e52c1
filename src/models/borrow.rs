//! Book borrow model and lifecycle rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Status of a borrow record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Pending,
    Borrowed,
    Returned,
}

impl BorrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Pending => "pending",
            BorrowStatus::Borrowed => "borrowed",
            BorrowStatus::Returned => "returned",
        }
    }

    /// Whether a record in this status still holds (or claims) a copy
    pub fn is_open(&self) -> bool {
        matches!(self, BorrowStatus::Pending | BorrowStatus::Borrowed)
    }

    /// Check that a record may move from `self` to `target`.
    ///
    /// Only `pending → borrowed` and `borrowed → returned` exist; every
    /// other pair is rejected, including staying in place.
    pub fn ensure_transition(&self, target: BorrowStatus) -> AppResult<()> {
        match (self, target) {
            (BorrowStatus::Pending, BorrowStatus::Borrowed)
            | (BorrowStatus::Borrowed, BorrowStatus::Returned) => Ok(()),
            (from, to) => Err(AppError::InvalidTransition(format!(
                "Cannot move a {} borrow to {}",
                from, to
            ))),
        }
    }

    /// Check that a record in this status may be deleted
    pub fn ensure_removable(&self) -> AppResult<()> {
        match self {
            BorrowStatus::Pending | BorrowStatus::Returned => Ok(()),
            BorrowStatus::Borrowed => Err(AppError::BorrowInProgress(
                "Book has not been returned yet".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for BorrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BorrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BorrowStatus::Pending),
            "borrowed" => Ok(BorrowStatus::Borrowed),
            "returned" => Ok(BorrowStatus::Returned),
            _ => Err(format!("Invalid borrow status: {}", s)),
        }
    }
}

// SQLx conversion for BorrowStatus (stored as TEXT)
impl sqlx::Type<Postgres> for BorrowStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for BorrowStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BorrowStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <String as Encode<Postgres>>::encode(self.as_str().to_string(), buf)
    }
}

/// Borrow record from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookBorrow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub note: Option<String>,
    pub borrow_status: BorrowStatus,
    pub requested_at: DateTime<Utc>,
    pub borrowed_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BookBorrow {
    /// Borrowed and past its due date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.borrow_status == BorrowStatus::Borrowed
            && self.due_at.map(|due| due < now).unwrap_or(false)
    }
}

/// Borrow record with computed fields, as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowDetails {
    #[serde(flatten)]
    pub borrow: BookBorrow,
    pub is_overdue: bool,
}

impl From<BookBorrow> for BorrowDetails {
    fn from(borrow: BookBorrow) -> Self {
        let is_overdue = borrow.is_overdue(Utc::now());
        Self { borrow, is_overdue }
    }
}

/// Borrow request body
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBorrow {
    pub book_id: Uuid,
    /// Borrower; defaults to the caller. Only staff may set another user.
    pub user_id: Option<Uuid>,
    #[validate(length(max = 1000, message = "Note must be at most 1000 characters"))]
    pub note: Option<String>,
}

/// Validated request handed to the store
#[derive(Debug, Clone)]
pub struct NewBorrow {
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub note: Option<String>,
}

/// Status transition body (`PUT /borrows/{id}`)
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBorrowStatus {
    pub borrow_status: BorrowStatus,
    /// Due date applied on accept; defaults to the configured loan length
    pub due_at: Option<DateTime<Utc>>,
}

/// Borrow list filters
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BorrowQuery {
    pub status: Option<BorrowStatus>,
    pub user_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    /// Only borrowed records past their due date
    pub overdue: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
