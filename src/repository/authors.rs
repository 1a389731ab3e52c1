//! Authors repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorQuery, CreateAuthor, UpdateAuthor},
        paginate,
    },
};

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get author by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Author> {
        sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// List authors, optionally filtered by name
    pub async fn search(&self, query: &AuthorQuery) -> AppResult<(Vec<Author>, i64)> {
        let (_, per_page, offset) = paginate(query.page, query.per_page);
        let pattern = query.name.as_ref().map(|n| format!("%{}%", n.to_lowercase()));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM authors WHERE ($1::text IS NULL OR LOWER(name) LIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let authors = sqlx::query_as::<_, Author>(
            r#"
            SELECT * FROM authors
            WHERE ($1::text IS NULL OR LOWER(name) LIKE $1)
            ORDER BY LOWER(name), id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((authors, total))
    }

    /// Create an author
    pub async fn create(&self, author: &CreateAuthor) -> AppResult<Author> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, Author>(
            r#"
            INSERT INTO authors (id, name, bio, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&author.name)
        .bind(&author.bio)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Update an author
    pub async fn update(&self, id: Uuid, author: &UpdateAuthor) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(
            r#"
            UPDATE authors SET
                name = COALESCE($2, name),
                bio = COALESCE($3, bio),
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&author.name)
        .bind(&author.bio)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// Delete an author that no book references
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let in_use: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE author_id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if in_use {
            return Err(AppError::Conflict("Author still has books in the catalog".to_string()));
        }

        let result = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Author with id {} not found", id)));
        }
        Ok(())
    }
}
