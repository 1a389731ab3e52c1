//! Catalog service: books, authors and categories

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorQuery, CreateAuthor, UpdateAuthor},
        book::{Book, BookQuery, CreateBook, UpdateBook},
        category::{Category, CreateCategory, UpdateCategory},
    },
    repository::{AuthorsRepository, BooksRepository, CategoriesRepository},
};

#[derive(Clone)]
pub struct CatalogService {
    books: Arc<dyn BooksRepository>,
    authors: AuthorsRepository,
    categories: CategoriesRepository,
}

impl CatalogService {
    pub fn new(
        books: Arc<dyn BooksRepository>,
        authors: AuthorsRepository,
        categories: CategoriesRepository,
    ) -> Self {
        Self { books, authors, categories }
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.books.search(query).await
    }

    pub async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.books.get_by_id(id).await
    }

    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        self.check_references(book.author_id, book.category_id).await?;

        let created = self.books.create(&book).await?;
        tracing::info!(book_id = %created.id, amount = created.amount, "Book created");
        Ok(created)
    }

    pub async fn update_book(&self, id: Uuid, book: UpdateBook) -> AppResult<Book> {
        book.validate()?;
        self.check_references(book.author_id, book.category_id).await?;

        // Fail early with a readable message; the store re-checks atomically
        if let Some(amount) = book.amount {
            self.books.get_by_id(id).await?.inventory().resize(amount)?;
        }

        self.books.update(id, &book).await
    }

    pub async fn delete_book(&self, id: Uuid) -> AppResult<()> {
        self.books.delete(id).await?;
        tracing::info!(book_id = %id, "Book deleted");
        Ok(())
    }

    async fn check_references(&self, author_id: Option<Uuid>, category_id: Option<Uuid>) -> AppResult<()> {
        if let Some(author_id) = author_id {
            self.authors.get_by_id(author_id).await?;
        }
        if let Some(category_id) = category_id {
            self.categories.get_by_id(category_id).await?;
        }
        Ok(())
    }

    // =========================================================================
    // AUTHORS
    // =========================================================================

    pub async fn search_authors(&self, query: &AuthorQuery) -> AppResult<(Vec<Author>, i64)> {
        self.authors.search(query).await
    }

    pub async fn get_author(&self, id: Uuid) -> AppResult<Author> {
        self.authors.get_by_id(id).await
    }

    pub async fn create_author(&self, author: CreateAuthor) -> AppResult<Author> {
        author.validate()?;
        self.authors.create(&author).await
    }

    pub async fn update_author(&self, id: Uuid, author: UpdateAuthor) -> AppResult<Author> {
        author.validate()?;
        self.authors.update(id, &author).await
    }

    pub async fn delete_author(&self, id: Uuid) -> AppResult<()> {
        self.authors.delete(id).await
    }

    // =========================================================================
    // CATEGORIES
    // =========================================================================

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.categories.list().await
    }

    pub async fn get_category(&self, id: Uuid) -> AppResult<Category> {
        self.categories.get_by_id(id).await
    }

    pub async fn create_category(&self, category: CreateCategory) -> AppResult<Category> {
        category.validate()?;
        if self.categories.name_exists(&category.name, None).await? {
            return Err(AppError::Conflict(format!(
                "Category '{}' already exists",
                category.name
            )));
        }
        self.categories.create(&category).await
    }

    pub async fn update_category(&self, id: Uuid, category: UpdateCategory) -> AppResult<Category> {
        category.validate()?;
        if let Some(ref name) = category.name {
            if self.categories.name_exists(name, Some(id)).await? {
                return Err(AppError::Conflict(format!("Category '{}' already exists", name)));
            }
        }
        self.categories.update(id, &category).await
    }

    pub async fn delete_category(&self, id: Uuid) -> AppResult<()> {
        self.categories.delete(id).await
    }
}
