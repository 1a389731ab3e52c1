//! Aggregate counters for the statistics endpoint

use sqlx::{FromRow, Pool, Postgres};

use crate::error::AppResult;

/// Catalog inventory totals
#[derive(Debug, Clone, FromRow)]
pub struct InventoryTotals {
    pub titles: i64,
    pub copies: i64,
    pub available: i64,
    pub lent: i64,
    pub lends_all_time: i64,
}

/// Borrow record counts by status
#[derive(Debug, Clone, FromRow)]
pub struct BorrowTotals {
    pub pending: i64,
    pub borrowed: i64,
    pub returned: i64,
    pub overdue: i64,
}

#[derive(Clone)]
pub struct StatsRepository {
    pool: Pool<Postgres>,
}

impl StatsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn inventory_totals(&self) -> AppResult<InventoryTotals> {
        let totals = sqlx::query_as::<_, InventoryTotals>(
            r#"
            SELECT COUNT(*) AS titles,
                   COALESCE(SUM(amount), 0)::bigint AS copies,
                   COALESCE(SUM(available), 0)::bigint AS available,
                   COALESCE(SUM(borrows), 0)::bigint AS lent,
                   COALESCE(SUM(borrowed_times), 0)::bigint AS lends_all_time
            FROM books
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    pub async fn borrow_totals(&self) -> AppResult<BorrowTotals> {
        let totals = sqlx::query_as::<_, BorrowTotals>(
            r#"
            SELECT COUNT(*) FILTER (WHERE borrow_status = 'pending') AS pending,
                   COUNT(*) FILTER (WHERE borrow_status = 'borrowed') AS borrowed,
                   COUNT(*) FILTER (WHERE borrow_status = 'returned') AS returned,
                   COUNT(*) FILTER (WHERE borrow_status = 'borrowed' AND due_at < NOW()) AS overdue
            FROM book_borrows
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    pub async fn count_members(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'member'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
