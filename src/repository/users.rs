//! Users repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        paginate,
        user::{Role, UpdateUser, User, UserQuery, UserShort},
    },
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by login (case-insensitive)
    pub async fn get_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(login) = LOWER($1)")
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Check if login already exists
    pub async fn login_exists(&self, login: &str, exclude_id: Option<Uuid>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(login) = LOWER($1) AND id != $2)")
                .bind(login)
                .bind(id)
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(login) = LOWER($1))")
                .bind(login)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    /// Whether at least one admin account exists
    pub async fn admin_exists(&self) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')")
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Search users with pagination
    pub async fn search(&self, query: &UserQuery) -> AppResult<(Vec<UserShort>, i64)> {
        let (_, per_page, offset) = paginate(query.page, query.per_page);
        let pattern = query.name.as_ref().map(|n| format!("%{}%", n.to_lowercase()));

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM users u
            WHERE ($1::text IS NULL OR LOWER(u.login) LIKE $1 OR LOWER(u.name) LIKE $1)
              AND ($2::text IS NULL OR u.role = $2)
            "#,
        )
        .bind(&pattern)
        .bind(query.role)
        .fetch_one(&self.pool)
        .await?;

        let users = sqlx::query_as::<_, UserShort>(
            r#"
            SELECT u.id, u.login, u.name, u.role,
                   (SELECT COUNT(*) FROM book_borrows b
                     WHERE b.user_id = u.id AND b.borrow_status = 'borrowed') AS nb_borrows,
                   (SELECT COUNT(*) FROM book_borrows b
                     WHERE b.user_id = u.id AND b.borrow_status = 'borrowed' AND b.due_at < NOW()) AS nb_overdue
            FROM users u
            WHERE ($1::text IS NULL OR LOWER(u.login) LIKE $1 OR LOWER(u.name) LIKE $1)
              AND ($2::text IS NULL OR u.role = $2)
            ORDER BY LOWER(u.login)
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&pattern)
        .bind(query.role)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((users, total))
    }

    /// Create a user with an already hashed password
    pub async fn create(
        &self,
        login: &str,
        password_hash: &str,
        name: Option<&str>,
        email: Option<&str>,
        role: Role,
    ) -> AppResult<User> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, login, password, name, email, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(login)
        .bind(password_hash)
        .bind(name)
        .bind(email)
        .bind(role)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Update a user; `password_hash` replaces the stored hash when set
    pub async fn update(&self, id: Uuid, user: &UpdateUser, password_hash: Option<String>) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                login = COALESCE($2, login),
                password = COALESCE($3, password),
                name = COALESCE($4, name),
                email = COALESCE($5, email),
                role = COALESCE($6, role),
                updated_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&user.login)
        .bind(password_hash)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Delete a user. Refused while a book is out on their name unless `force`.
    ///
    /// A forced delete returns the user's lent copies to the shelf first so
    /// the book counters stay balanced once the records cascade away.
    pub async fn delete(&self, id: Uuid, force: bool) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Lock the open records so an accept cannot slip in before the cascade
        let open: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT borrow_status FROM book_borrows
            WHERE user_id = $1 AND borrow_status IN ('pending', 'borrowed')
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let borrowed = open.iter().filter(|status| *status == "borrowed").count();

        if borrowed > 0 && !force {
            return Err(AppError::BorrowInProgress(format!(
                "User still has {} borrowed book(s)",
                borrowed
            )));
        }

        if borrowed > 0 {
            sqlx::query(
                r#"
                UPDATE books b SET
                    available = b.available + o.n,
                    borrows = b.borrows - o.n,
                    updated_at = NOW()
                FROM (
                    SELECT book_id, COUNT(*)::int AS n
                    FROM book_borrows
                    WHERE user_id = $1 AND borrow_status = 'borrowed'
                    GROUP BY book_id
                ) o
                WHERE b.id = o.book_id
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }
}
