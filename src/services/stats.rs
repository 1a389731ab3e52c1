//! Statistics service

use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, repository::StatsRepository};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    pub titles: i64,
    pub copies: i64,
    pub available: i64,
    pub lent: i64,
    pub lends_all_time: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowStats {
    pub pending: i64,
    pub borrowed: i64,
    pub returned: i64,
    pub overdue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStats {
    pub inventory: InventoryStats,
    pub borrows: BorrowStats,
    pub members: i64,
}

#[derive(Clone)]
pub struct StatsService {
    stats: StatsRepository,
}

impl StatsService {
    pub fn new(stats: StatsRepository) -> Self {
        Self { stats }
    }

    pub async fn get_stats(&self) -> AppResult<LibraryStats> {
        let inventory = self.stats.inventory_totals().await?;
        let borrows = self.stats.borrow_totals().await?;
        let members = self.stats.count_members().await?;

        Ok(LibraryStats {
            inventory: InventoryStats {
                titles: inventory.titles,
                copies: inventory.copies,
                available: inventory.available,
                lent: inventory.lent,
                lends_all_time: inventory.lends_all_time,
            },
            borrows: BorrowStats {
                pending: borrows.pending,
                borrowed: borrows.borrowed,
                returned: borrows.returned,
                overdue: borrows.overdue,
            },
            members,
        })
    }
}
