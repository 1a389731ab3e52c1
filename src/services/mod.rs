//! Business logic services

pub mod borrows;
pub mod catalog;
pub mod stats;
pub mod users;

use sqlx::{Pool, Postgres};

use crate::{
    config::{AuthConfig, BorrowsConfig},
    error::AppResult,
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub borrows: borrows::BorrowsService,
    pub stats: stats::StatsService,
    pool: Pool<Postgres>,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig, borrows_config: BorrowsConfig) -> Self {
        Self {
            users: users::UsersService::new(repository.users.clone(), auth_config),
            catalog: catalog::CatalogService::new(
                repository.books.clone(),
                repository.authors.clone(),
                repository.categories.clone(),
            ),
            borrows: borrows::BorrowsService::new(
                repository.books.clone(),
                repository.borrows.clone(),
                borrows_config,
            ),
            stats: stats::StatsService::new(repository.stats.clone()),
            pool: repository.pool,
        }
    }

    /// Round-trip to the database for readiness probes
    pub async fn check_database(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
