//! Categories repository

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::category::{Category, CreateCategory, UpdateCategory},
};

#[derive(Clone)]
pub struct CategoriesRepository {
    pool: Pool<Postgres>,
}

impl CategoriesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY LOWER(name)")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
    }

    /// Check if a name is taken (case-insensitive)
    pub async fn name_exists(&self, name: &str, exclude_id: Option<Uuid>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE LOWER(name) = LOWER($1) AND ($2::uuid IS NULL OR id != $2))",
        )
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create(&self, category: &CreateCategory) -> AppResult<Category> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, name, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(category.name.trim())
        .bind(&category.description)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, category: &UpdateCategory) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(category.name.as_deref().map(str::trim))
        .bind(&category.description)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let in_use: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE category_id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if in_use {
            return Err(AppError::Conflict("Category still has books in the catalog".to_string()));
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Category with id {} not found", id)));
        }
        Ok(())
    }
}
