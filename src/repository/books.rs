//! Books repository: catalog titles and their inventory counters

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        paginate,
    },
};

/// Book store used by the catalog and borrow services
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BooksRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Book>;

    /// Search books with pagination, returns (page, total)
    async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)>;

    /// Insert a title with `available = amount` and zeroed lend counters
    async fn create(&self, book: &CreateBook) -> AppResult<Book>;

    /// Update descriptive fields; a new `amount` re-derives `available`
    /// and fails with a conflict when fewer copies than `borrows` remain
    async fn update(&self, id: Uuid, book: &UpdateBook) -> AppResult<Book>;

    /// Delete a title that has no copy currently lent
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgBooksRepository {
    pool: Pool<Postgres>,
}

impl PgBooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: Uuid) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl BooksRepository for PgBooksRepository {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let (_, per_page, offset) = paginate(query.page, query.per_page);

        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.title.is_some() {
            conditions.push(format!("LOWER(title) LIKE ${}", idx));
            idx += 1;
        }
        if query.author_id.is_some() {
            conditions.push(format!("author_id = ${}", idx));
            idx += 1;
        }
        if query.category_id.is_some() {
            conditions.push(format!("category_id = ${}", idx));
        }
        if query.available.unwrap_or(false) {
            conditions.push("available > 0".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let title = query
            .title
            .as_ref()
            .map(|t| format!("%{}%", t.to_lowercase()));

        // Count total
        let count_q = format!("SELECT COUNT(*) FROM books {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(ref t) = title { count_builder = count_builder.bind(t); }
        if let Some(a) = query.author_id { count_builder = count_builder.bind(a); }
        if let Some(c) = query.category_id { count_builder = count_builder.bind(c); }
        let total = count_builder.fetch_one(&self.pool).await?;

        // Fetch rows
        let select_q = format!(
            "SELECT * FROM books {} ORDER BY LOWER(title), id LIMIT {} OFFSET {}",
            where_clause, per_page, offset
        );
        let mut builder = sqlx::query_as::<_, Book>(&select_q);
        if let Some(ref t) = title { builder = builder.bind(t); }
        if let Some(a) = query.author_id { builder = builder.bind(a); }
        if let Some(c) = query.category_id { builder = builder.bind(c); }

        let books = builder.fetch_all(&self.pool).await?;
        Ok((books, total))
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let now = Utc::now();

        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                id, title, isbn, description, image, language, pages, published_year,
                author_id, category_id, amount, available, borrows, borrowed_times,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11, 0, 0, $12, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(&book.description)
        .bind(&book.image)
        .bind(&book.language)
        .bind(book.pages)
        .bind(book.published_year)
        .bind(book.author_id)
        .bind(book.category_id)
        .bind(book.amount)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(&self, id: Uuid, book: &UpdateBook) -> AppResult<Book> {
        // Counters are re-derived in the same statement so a concurrent
        // accept/return cannot interleave between read and write.
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                isbn = COALESCE($3, isbn),
                description = COALESCE($4, description),
                image = COALESCE($5, image),
                language = COALESCE($6, language),
                pages = COALESCE($7, pages),
                published_year = COALESCE($8, published_year),
                author_id = COALESCE($9, author_id),
                category_id = COALESCE($10, category_id),
                amount = COALESCE($11, amount),
                available = COALESCE($11, amount) - borrows,
                updated_at = $12
            WHERE id = $1 AND COALESCE($11, amount) >= borrows
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(&book.description)
        .bind(&book.image)
        .bind(&book.language)
        .bind(book.pages)
        .bind(book.published_year)
        .bind(book.author_id)
        .bind(book.category_id)
        .bind(book.amount)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(book) => Ok(book),
            None if self.exists(id).await? => Err(AppError::Conflict(
                "Amount cannot be lower than the number of lent copies".to_string(),
            )),
            None => Err(AppError::NotFound(format!("Book with id {} not found", id))),
        }
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1 AND borrows = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        if self.exists(id).await? {
            Err(AppError::BorrowInProgress(
                "Book still has copies out on loan".to_string(),
            ))
        } else {
            Err(AppError::NotFound(format!("Book with id {} not found", id)))
        }
    }
}
