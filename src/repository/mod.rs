//! Repository layer for database operations

pub mod authors;
pub mod books;
pub mod borrows;
pub mod categories;
pub mod stats;
pub mod users;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

pub use authors::AuthorsRepository;
pub use books::{BooksRepository, PgBooksRepository};
pub use borrows::{BorrowsRepository, PgBorrowsRepository};
pub use categories::CategoriesRepository;
pub use stats::StatsRepository;
pub use users::UsersRepository;

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: Arc<dyn BooksRepository>,
    pub borrows: Arc<dyn BorrowsRepository>,
    pub authors: AuthorsRepository,
    pub categories: CategoriesRepository,
    pub users: UsersRepository,
    pub stats: StatsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(PgBooksRepository::new(pool.clone())),
            borrows: Arc::new(PgBorrowsRepository::new(pool.clone())),
            authors: AuthorsRepository::new(pool.clone()),
            categories: CategoriesRepository::new(pool.clone()),
            users: UsersRepository::new(pool.clone()),
            stats: StatsRepository::new(pool.clone()),
            pool,
        }
    }
}
