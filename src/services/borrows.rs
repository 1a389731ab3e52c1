//! Borrow lifecycle service
//!
//! `none → pending → borrowed → returned`, with deletion allowed for
//! pending and returned records only. Inventory counters move on accept
//! and return; the store applies both writes atomically.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::BorrowsConfig,
    error::{AppError, AppResult},
    models::{
        borrow::{BookBorrow, BorrowQuery, BorrowStatus, CreateBorrow, NewBorrow, UpdateBorrowStatus},
        user::UserClaims,
    },
    repository::{BooksRepository, BorrowsRepository},
};

#[derive(Clone)]
pub struct BorrowsService {
    books: Arc<dyn BooksRepository>,
    borrows: Arc<dyn BorrowsRepository>,
    config: BorrowsConfig,
}

impl BorrowsService {
    pub fn new(
        books: Arc<dyn BooksRepository>,
        borrows: Arc<dyn BorrowsRepository>,
        config: BorrowsConfig,
    ) -> Self {
        Self { books, borrows, config }
    }

    /// Request a borrow (none → pending)
    pub async fn request(&self, claims: &UserClaims, request: CreateBorrow) -> AppResult<BookBorrow> {
        request.validate()?;

        let user_id = match request.user_id {
            Some(id) if id != claims.user_id => {
                claims.require_staff()?;
                id
            }
            _ => claims.user_id,
        };

        let book = self.books.get_by_id(request.book_id).await?;

        if self.borrows.find_open(user_id, book.id).await?.is_some() {
            return Err(AppError::DuplicateBorrow(
                "An open borrow already exists for this book".to_string(),
            ));
        }

        book.inventory().ensure_available()?;

        let borrow = self
            .borrows
            .create_request(&NewBorrow {
                user_id,
                book_id: book.id,
                note: request.note,
            })
            .await?;

        tracing::info!(
            borrow_id = %borrow.id,
            user_id = %user_id,
            book_id = %book.id,
            "Borrow requested"
        );

        Ok(borrow)
    }

    /// Get a single record (owner or staff)
    pub async fn get(&self, claims: &UserClaims, id: Uuid) -> AppResult<BookBorrow> {
        let borrow = self.borrows.get_by_id(id).await?;
        claims.require_self_or_staff(borrow.user_id)?;
        Ok(borrow)
    }

    /// List records. Members are restricted to their own.
    pub async fn list(&self, claims: &UserClaims, mut query: BorrowQuery) -> AppResult<(Vec<BookBorrow>, i64)> {
        if !claims.is_staff() {
            if let Some(user_id) = query.user_id {
                claims.require_self_or_staff(user_id)?;
            }
            query.user_id = Some(claims.user_id);
        }

        self.borrows.search(&query).await
    }

    /// Apply a status transition (staff only)
    pub async fn update_status(
        &self,
        claims: &UserClaims,
        id: Uuid,
        update: UpdateBorrowStatus,
    ) -> AppResult<BookBorrow> {
        claims.require_staff()?;

        let borrow = self.borrows.get_by_id(id).await?;
        borrow.borrow_status.ensure_transition(update.borrow_status)?;

        match update.borrow_status {
            BorrowStatus::Borrowed => self.accept(claims, borrow, update.due_at).await,
            BorrowStatus::Returned => self.return_book(claims, borrow).await,
            BorrowStatus::Pending => Err(AppError::InvalidTransition(
                "A borrow cannot go back to pending".to_string(),
            )),
        }
    }

    /// pending → borrowed
    async fn accept(
        &self,
        claims: &UserClaims,
        borrow: BookBorrow,
        due_at: Option<DateTime<Utc>>,
    ) -> AppResult<BookBorrow> {
        let now = Utc::now();
        let due_at = match due_at {
            Some(due) if due <= now => {
                return Err(AppError::Validation("dueAt must be in the future".to_string()));
            }
            Some(due) => due,
            None => now + Duration::days(self.config.loan_duration_days),
        };

        let book = self.books.get_by_id(borrow.book_id).await?;
        book.inventory().ensure_available()?;

        let accepted = self.borrows.accept(borrow.id, due_at).await?;

        tracing::info!(
            borrow_id = %accepted.id,
            book_id = %accepted.book_id,
            staff_id = %claims.user_id,
            due_at = %due_at,
            "Borrow accepted"
        );

        Ok(accepted)
    }

    /// borrowed → returned
    async fn return_book(&self, claims: &UserClaims, borrow: BookBorrow) -> AppResult<BookBorrow> {
        let returned = self.borrows.mark_returned(borrow.id).await?;

        let late = borrow.is_overdue(Utc::now());
        tracing::info!(
            borrow_id = %returned.id,
            book_id = %returned.book_id,
            staff_id = %claims.user_id,
            late,
            "Book returned"
        );

        Ok(returned)
    }

    /// Cancel a pending request (owner or staff) or remove a returned
    /// record (staff). Borrowed records are never deleted.
    pub async fn delete(&self, claims: &UserClaims, id: Uuid) -> AppResult<()> {
        let borrow = self.borrows.get_by_id(id).await?;
        claims.require_self_or_staff(borrow.user_id)?;
        borrow.borrow_status.ensure_removable()?;

        if borrow.borrow_status == BorrowStatus::Returned {
            claims.require_staff()?;
        }

        self.borrows.delete(id).await?;

        tracing::info!(
            borrow_id = %id,
            status = %borrow.borrow_status,
            by = %claims.user_id,
            "Borrow record deleted"
        );

        Ok(())
    }
}
