//! Borrow records repository
//!
//! Every status change that moves a copy (accept, return) runs the record
//! update and the book counter update in one transaction, each guarded by
//! a condition on the state it expects to find.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::{BookBorrow, BorrowQuery, BorrowStatus, NewBorrow},
        paginate,
    },
};

/// Borrow record store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowsRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<BookBorrow>;

    /// List records with filters and pagination, returns (page, total)
    async fn search(&self, query: &BorrowQuery) -> AppResult<(Vec<BookBorrow>, i64)>;

    /// Pending or borrowed record for (user, book), if any
    async fn find_open(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<BookBorrow>>;

    /// Insert a pending record, only while the book has a free copy
    async fn create_request(&self, borrow: &NewBorrow) -> AppResult<BookBorrow>;

    /// pending → borrowed; takes one copy off the shelf
    async fn accept(&self, id: Uuid, due_at: DateTime<Utc>) -> AppResult<BookBorrow>;

    /// borrowed → returned; puts one copy back
    async fn mark_returned(&self, id: Uuid) -> AppResult<BookBorrow>;

    /// Delete a pending or returned record
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgBorrowsRepository {
    pool: Pool<Postgres>,
}

impl PgBorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn book_exists(&self, book_id: Uuid) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
            .bind(book_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl BorrowsRepository for PgBorrowsRepository {
    async fn get_by_id(&self, id: Uuid) -> AppResult<BookBorrow> {
        sqlx::query_as::<_, BookBorrow>("SELECT * FROM book_borrows WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
    }

    async fn search(&self, query: &BorrowQuery) -> AppResult<(Vec<BookBorrow>, i64)> {
        let (_, per_page, offset) = paginate(query.page, query.per_page);

        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.status.is_some() {
            conditions.push(format!("borrow_status = ${}", idx));
            idx += 1;
        }
        if query.user_id.is_some() {
            conditions.push(format!("user_id = ${}", idx));
            idx += 1;
        }
        if query.book_id.is_some() {
            conditions.push(format!("book_id = ${}", idx));
        }
        if query.overdue.unwrap_or(false) {
            conditions.push("borrow_status = 'borrowed' AND due_at < NOW()".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_q = format!("SELECT COUNT(*) FROM book_borrows {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(s) = query.status { count_builder = count_builder.bind(s); }
        if let Some(u) = query.user_id { count_builder = count_builder.bind(u); }
        if let Some(b) = query.book_id { count_builder = count_builder.bind(b); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "SELECT * FROM book_borrows {} ORDER BY requested_at DESC, id LIMIT {} OFFSET {}",
            where_clause, per_page, offset
        );
        let mut builder = sqlx::query_as::<_, BookBorrow>(&select_q);
        if let Some(s) = query.status { builder = builder.bind(s); }
        if let Some(u) = query.user_id { builder = builder.bind(u); }
        if let Some(b) = query.book_id { builder = builder.bind(b); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    async fn find_open(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<BookBorrow>> {
        let borrow = sqlx::query_as::<_, BookBorrow>(
            r#"
            SELECT * FROM book_borrows
            WHERE user_id = $1 AND book_id = $2 AND borrow_status IN ('pending', 'borrowed')
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(borrow)
    }

    async fn create_request(&self, borrow: &NewBorrow) -> AppResult<BookBorrow> {
        let now = Utc::now();

        let inserted = sqlx::query_as::<_, BookBorrow>(
            r#"
            INSERT INTO book_borrows (id, user_id, book_id, note, borrow_status, requested_at, created_at)
            SELECT $1, $2, b.id, $4, $5, $6, $6
            FROM books b
            WHERE b.id = $3 AND b.available > 0
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(borrow.user_id)
        .bind(borrow.book_id)
        .bind(&borrow.note)
        .bind(BorrowStatus::Pending)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;

        let inserted = match inserted {
            Ok(row) => row,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(AppError::DuplicateBorrow(
                    "An open borrow already exists for this book".to_string(),
                ));
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                return Err(AppError::NotFound(format!(
                    "User with id {} not found",
                    borrow.user_id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        match inserted {
            Some(row) => Ok(row),
            None if self.book_exists(borrow.book_id).await? => Err(AppError::BookUnavailable(
                "No copy of this book is available".to_string(),
            )),
            None => Err(AppError::NotFound(format!(
                "Book with id {} not found",
                borrow.book_id
            ))),
        }
    }

    async fn accept(&self, id: Uuid, due_at: DateTime<Utc>) -> AppResult<BookBorrow> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let borrow = sqlx::query_as::<_, BookBorrow>(
            r#"
            UPDATE book_borrows
            SET borrow_status = 'borrowed', borrowed_at = $2, due_at = $3
            WHERE id = $1 AND borrow_status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(due_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::InvalidTransition("Borrow is no longer pending".to_string()))?;

        let lent = sqlx::query(
            r#"
            UPDATE books
            SET available = available - 1,
                borrows = borrows + 1,
                borrowed_times = borrowed_times + 1,
                updated_at = $2
            WHERE id = $1 AND available > 0
            "#,
        )
        .bind(borrow.book_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if lent.rows_affected() == 0 {
            // Dropping the transaction rolls the status change back
            return Err(AppError::BookUnavailable(
                "No copy of this book is available".to_string(),
            ));
        }

        tx.commit().await?;
        Ok(borrow)
    }

    async fn mark_returned(&self, id: Uuid) -> AppResult<BookBorrow> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let borrow = sqlx::query_as::<_, BookBorrow>(
            r#"
            UPDATE book_borrows
            SET borrow_status = 'returned', returned_at = $2
            WHERE id = $1 AND borrow_status = 'borrowed'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::InvalidTransition("Borrow is not currently borrowed".to_string()))?;

        let restored = sqlx::query(
            r#"
            UPDATE books
            SET available = available + 1,
                borrows = borrows - 1,
                updated_at = $2
            WHERE id = $1 AND borrows > 0
            "#,
        )
        .bind(borrow.book_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if restored.rows_affected() == 0 {
            return Err(AppError::Internal(format!(
                "Book {} has no lent copy to take back",
                borrow.book_id
            )));
        }

        tx.commit().await?;
        Ok(borrow)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "DELETE FROM book_borrows WHERE id = $1 AND borrow_status IN ('pending', 'returned')",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Tell a borrowed record apart from a missing one
        self.get_by_id(id).await?.borrow_status.ensure_removable()?;
        Err(AppError::InvalidTransition("Borrow changed status concurrently".to_string()))
    }
}
