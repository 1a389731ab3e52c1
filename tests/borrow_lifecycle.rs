//! Borrow lifecycle against an in-memory library
//!
//! The store mirrors the conditional writes of the Postgres repositories so
//! the service can be driven end to end without a database. Counters move
//! through the `Inventory` helpers here, not through the SQL statements; the
//! Postgres path is covered by the ignored tests in `tests/integration`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use libris_server::{
    config::BorrowsConfig,
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        borrow::{BookBorrow, BorrowQuery, BorrowStatus, CreateBorrow, NewBorrow, UpdateBorrowStatus},
        paginate,
        user::{Role, UserClaims},
    },
    repository::{BooksRepository, BorrowsRepository},
    services::borrows::BorrowsService,
};

#[derive(Default)]
struct Shelves {
    books: HashMap<Uuid, Book>,
    borrows: HashMap<Uuid, BookBorrow>,
}

#[derive(Default)]
struct MemoryLibrary {
    shelves: Mutex<Shelves>,
}

impl MemoryLibrary {
    fn book(&self, id: Uuid) -> Book {
        self.shelves.lock().unwrap().books[&id].clone()
    }
}

fn book_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Book with id {} not found", id))
}

fn borrow_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Borrow with id {} not found", id))
}

#[async_trait]
impl BooksRepository for MemoryLibrary {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        let shelves = self.shelves.lock().unwrap();
        shelves.books.get(&id).cloned().ok_or_else(|| book_not_found(id))
    }

    async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let (_, per_page, offset) = paginate(query.page, query.per_page);
        let shelves = self.shelves.lock().unwrap();
        let mut books: Vec<Book> = shelves
            .books
            .values()
            .filter(|b| !query.available.unwrap_or(false) || b.available > 0)
            .cloned()
            .collect();
        books.sort_by(|a, b| a.title.cmp(&b.title));
        let total = books.len() as i64;
        let page = books.into_iter().skip(offset as usize).take(per_page as usize).collect();
        Ok((page, total))
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let now = Utc::now();
        let created = Book {
            id: Uuid::new_v4(),
            title: book.title.clone(),
            isbn: book.isbn.clone(),
            description: book.description.clone(),
            image: book.image.clone(),
            language: book.language.clone(),
            pages: book.pages,
            published_year: book.published_year,
            author_id: book.author_id,
            category_id: book.category_id,
            amount: book.amount,
            available: book.amount,
            borrows: 0,
            borrowed_times: 0,
            created_at: now,
            updated_at: now,
        };
        self.shelves.lock().unwrap().books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, update: &UpdateBook) -> AppResult<Book> {
        let mut shelves = self.shelves.lock().unwrap();
        let book = shelves.books.get_mut(&id).ok_or_else(|| book_not_found(id))?;
        if let Some(amount) = update.amount {
            let resized = book.inventory().resize(amount)?;
            book.apply_inventory(resized);
        }
        if let Some(ref title) = update.title {
            book.title = title.clone();
        }
        book.updated_at = Utc::now();
        Ok(book.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut shelves = self.shelves.lock().unwrap();
        let book = shelves.books.get(&id).ok_or_else(|| book_not_found(id))?;
        if book.borrows > 0 {
            return Err(AppError::BorrowInProgress("Book still has copies out on loan".to_string()));
        }
        shelves.books.remove(&id);
        shelves.borrows.retain(|_, b| b.book_id != id);
        Ok(())
    }
}

#[async_trait]
impl BorrowsRepository for MemoryLibrary {
    async fn get_by_id(&self, id: Uuid) -> AppResult<BookBorrow> {
        let shelves = self.shelves.lock().unwrap();
        shelves.borrows.get(&id).cloned().ok_or_else(|| borrow_not_found(id))
    }

    async fn search(&self, query: &BorrowQuery) -> AppResult<(Vec<BookBorrow>, i64)> {
        let (_, per_page, offset) = paginate(query.page, query.per_page);
        let now = Utc::now();
        let shelves = self.shelves.lock().unwrap();
        let mut rows: Vec<BookBorrow> = shelves
            .borrows
            .values()
            .filter(|b| query.status.map_or(true, |s| b.borrow_status == s))
            .filter(|b| query.user_id.map_or(true, |u| b.user_id == u))
            .filter(|b| query.book_id.map_or(true, |id| b.book_id == id))
            .filter(|b| !query.overdue.unwrap_or(false) || b.is_overdue(now))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        let total = rows.len() as i64;
        let page = rows.into_iter().skip(offset as usize).take(per_page as usize).collect();
        Ok((page, total))
    }

    async fn find_open(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<BookBorrow>> {
        let shelves = self.shelves.lock().unwrap();
        Ok(shelves
            .borrows
            .values()
            .find(|b| b.user_id == user_id && b.book_id == book_id && b.borrow_status.is_open())
            .cloned())
    }

    async fn create_request(&self, borrow: &NewBorrow) -> AppResult<BookBorrow> {
        let mut shelves = self.shelves.lock().unwrap();
        let book = shelves.books.get(&borrow.book_id).ok_or_else(|| book_not_found(borrow.book_id))?;
        book.inventory().ensure_available()?;

        let duplicate = shelves.borrows.values().any(|b| {
            b.user_id == borrow.user_id && b.book_id == borrow.book_id && b.borrow_status.is_open()
        });
        if duplicate {
            return Err(AppError::DuplicateBorrow(
                "An open borrow already exists for this book".to_string(),
            ));
        }

        let now = Utc::now();
        let record = BookBorrow {
            id: Uuid::new_v4(),
            user_id: borrow.user_id,
            book_id: borrow.book_id,
            note: borrow.note.clone(),
            borrow_status: BorrowStatus::Pending,
            requested_at: now,
            borrowed_at: None,
            returned_at: None,
            due_at: None,
            created_at: now,
        };
        shelves.borrows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn accept(&self, id: Uuid, due_at: DateTime<Utc>) -> AppResult<BookBorrow> {
        let mut shelves = self.shelves.lock().unwrap();
        let record = shelves.borrows.get(&id).cloned().ok_or_else(|| borrow_not_found(id))?;
        if record.borrow_status != BorrowStatus::Pending {
            return Err(AppError::InvalidTransition("Borrow is no longer pending".to_string()));
        }

        // Both writes happen under one lock, or neither does
        let book = shelves
            .books
            .get_mut(&record.book_id)
            .ok_or_else(|| book_not_found(record.book_id))?;
        let lent = book.inventory().lend()?;
        book.apply_inventory(lent);

        let record = shelves.borrows.get_mut(&id).ok_or_else(|| borrow_not_found(id))?;
        record.borrow_status = BorrowStatus::Borrowed;
        record.borrowed_at = Some(Utc::now());
        record.due_at = Some(due_at);
        Ok(record.clone())
    }

    async fn mark_returned(&self, id: Uuid) -> AppResult<BookBorrow> {
        let mut shelves = self.shelves.lock().unwrap();
        let record = shelves.borrows.get(&id).cloned().ok_or_else(|| borrow_not_found(id))?;
        if record.borrow_status != BorrowStatus::Borrowed {
            return Err(AppError::InvalidTransition("Borrow is not currently borrowed".to_string()));
        }

        let book = shelves
            .books
            .get_mut(&record.book_id)
            .ok_or_else(|| book_not_found(record.book_id))?;
        let restored = book.inventory().restore()?;
        book.apply_inventory(restored);

        let record = shelves.borrows.get_mut(&id).ok_or_else(|| borrow_not_found(id))?;
        record.borrow_status = BorrowStatus::Returned;
        record.returned_at = Some(Utc::now());
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut shelves = self.shelves.lock().unwrap();
        let record = shelves.borrows.get(&id).ok_or_else(|| borrow_not_found(id))?;
        record.borrow_status.ensure_removable()?;
        shelves.borrows.remove(&id);
        Ok(())
    }
}

struct Desk {
    library: Arc<MemoryLibrary>,
    service: BorrowsService,
    librarian: UserClaims,
}

fn claims(role: Role) -> UserClaims {
    let now = Utc::now().timestamp();
    UserClaims {
        sub: format!("{}-{}", role, now),
        user_id: Uuid::new_v4(),
        role,
        exp: now + 3600,
        iat: now,
    }
}

fn desk() -> Desk {
    let library = Arc::new(MemoryLibrary::default());
    let service = BorrowsService::new(library.clone(), library.clone(), BorrowsConfig::default());
    Desk {
        library,
        service,
        librarian: claims(Role::Librarian),
    }
}

impl Desk {
    async fn shelve(&self, title: &str, amount: i32) -> Uuid {
        let book = BooksRepository::create(
            self.library.as_ref(),
            &CreateBook {
                title: title.to_string(),
                isbn: None,
                description: None,
                image: None,
                language: None,
                pages: None,
                published_year: None,
                author_id: None,
                category_id: None,
                amount,
            },
        )
        .await
        .unwrap();
        book.id
    }

    async fn request(&self, member: &UserClaims, book_id: Uuid) -> AppResult<BookBorrow> {
        self.service
            .request(member, CreateBorrow { book_id, user_id: None, note: None })
            .await
    }

    async fn set_status(&self, id: Uuid, status: BorrowStatus) -> AppResult<BookBorrow> {
        self.service
            .update_status(
                &self.librarian,
                id,
                UpdateBorrowStatus { borrow_status: status, due_at: None },
            )
            .await
    }
}

#[tokio::test]
async fn test_request_fails_when_no_copy_is_available() {
    let desk = desk();
    let book_id = desk.shelve("Solaris", 0).await;

    let result = desk.request(&claims(Role::Member), book_id).await;

    assert!(matches!(result, Err(AppError::BookUnavailable(_))));
    assert_eq!(desk.library.book(book_id).available, 0);
}

#[tokio::test]
async fn test_request_leaves_counters_untouched() {
    let desk = desk();
    let book_id = desk.shelve("Roadside Picnic", 2).await;

    let borrow = desk.request(&claims(Role::Member), book_id).await.unwrap();

    assert_eq!(borrow.borrow_status, BorrowStatus::Pending);
    let book = desk.library.book(book_id);
    assert_eq!((book.available, book.borrows, book.borrowed_times), (2, 0, 0));
}

#[tokio::test]
async fn test_accept_moves_exactly_one_copy() {
    let desk = desk();
    let book_id = desk.shelve("Dune", 3).await;
    let borrow = desk.request(&claims(Role::Member), book_id).await.unwrap();

    let before = desk.library.book(book_id);
    let accepted = desk.set_status(borrow.id, BorrowStatus::Borrowed).await.unwrap();
    let after = desk.library.book(book_id);

    assert_eq!(accepted.borrow_status, BorrowStatus::Borrowed);
    assert!(accepted.borrowed_at.is_some());
    assert!(accepted.due_at.unwrap() > Utc::now() + Duration::days(13));
    assert_eq!(after.available, before.available - 1);
    assert_eq!(after.borrows, before.borrows + 1);
    assert_eq!(after.borrowed_times, before.borrowed_times + 1);
}

#[tokio::test]
async fn test_return_puts_the_copy_back() {
    let desk = desk();
    let book_id = desk.shelve("Kindred", 1).await;
    let borrow = desk.request(&claims(Role::Member), book_id).await.unwrap();
    desk.set_status(borrow.id, BorrowStatus::Borrowed).await.unwrap();

    let before = desk.library.book(book_id);
    let returned = desk.set_status(borrow.id, BorrowStatus::Returned).await.unwrap();
    let after = desk.library.book(book_id);

    assert_eq!(returned.borrow_status, BorrowStatus::Returned);
    assert!(returned.returned_at.is_some());
    assert_eq!(after.available, before.available + 1);
    assert_eq!(after.borrows, before.borrows - 1);
    assert_eq!(after.borrowed_times, before.borrowed_times);
}

#[tokio::test]
async fn test_deleting_a_borrowed_record_is_rejected() {
    let desk = desk();
    let book_id = desk.shelve("Neuromancer", 1).await;
    let member = claims(Role::Member);
    let borrow = desk.request(&member, book_id).await.unwrap();
    desk.set_status(borrow.id, BorrowStatus::Borrowed).await.unwrap();

    let by_staff = desk.service.delete(&desk.librarian, borrow.id).await;
    let by_owner = desk.service.delete(&member, borrow.id).await;

    assert!(matches!(by_staff, Err(AppError::BorrowInProgress(_))));
    assert!(matches!(by_owner, Err(AppError::BorrowInProgress(_))));
    assert_eq!(desk.library.book(book_id).borrows, 1);
}

#[tokio::test]
async fn test_pending_and_returned_records_can_be_deleted() {
    let desk = desk();
    let book_id = desk.shelve("The Dispossessed", 2).await;
    let member = claims(Role::Member);

    let pending = desk.request(&member, book_id).await.unwrap();
    desk.service.delete(&member, pending.id).await.unwrap();

    let borrow = desk.request(&member, book_id).await.unwrap();
    desk.set_status(borrow.id, BorrowStatus::Borrowed).await.unwrap();
    desk.set_status(borrow.id, BorrowStatus::Returned).await.unwrap();
    desk.service.delete(&desk.librarian, borrow.id).await.unwrap();

    let book = desk.library.book(book_id);
    assert_eq!((book.available, book.borrows, book.borrowed_times), (2, 0, 1));
    assert!(matches!(
        desk.service.get(&member, borrow.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_skipping_or_repeating_a_step_is_an_invalid_transition() {
    let desk = desk();
    let book_id = desk.shelve("Ubik", 1).await;
    let borrow = desk.request(&claims(Role::Member), book_id).await.unwrap();

    assert!(matches!(
        desk.set_status(borrow.id, BorrowStatus::Returned).await,
        Err(AppError::InvalidTransition(_))
    ));

    desk.set_status(borrow.id, BorrowStatus::Borrowed).await.unwrap();
    assert!(matches!(
        desk.set_status(borrow.id, BorrowStatus::Borrowed).await,
        Err(AppError::InvalidTransition(_))
    ));
    assert!(matches!(
        desk.set_status(borrow.id, BorrowStatus::Pending).await,
        Err(AppError::InvalidTransition(_))
    ));
    assert_eq!(desk.library.book(book_id).borrows, 1);
}

#[tokio::test]
async fn test_accept_fails_once_the_last_copy_is_gone() {
    let desk = desk();
    let book_id = desk.shelve("Hyperion", 1).await;
    let first = desk.request(&claims(Role::Member), book_id).await.unwrap();
    let second = desk.request(&claims(Role::Member), book_id).await.unwrap();

    desk.set_status(first.id, BorrowStatus::Borrowed).await.unwrap();
    let result = desk.set_status(second.id, BorrowStatus::Borrowed).await;

    assert!(matches!(result, Err(AppError::BookUnavailable(_))));
    let still_pending = BorrowsRepository::get_by_id(desk.library.as_ref(), second.id).await.unwrap();
    assert_eq!(still_pending.borrow_status, BorrowStatus::Pending);
    let book = desk.library.book(book_id);
    assert_eq!((book.available, book.borrows), (0, 1));
}

#[tokio::test]
async fn test_second_open_request_for_the_same_book_is_a_duplicate() {
    let desk = desk();
    let book_id = desk.shelve("Blindsight", 4).await;
    let member = claims(Role::Member);

    desk.request(&member, book_id).await.unwrap();
    let again = desk.request(&member, book_id).await;

    assert!(matches!(again, Err(AppError::DuplicateBorrow(_))));
}

#[tokio::test]
async fn test_counters_stay_balanced_over_mixed_sequences() {
    let desk = desk();
    let books = [
        desk.shelve("A Wizard of Earthsea", 1).await,
        desk.shelve("Lilith's Brood", 2).await,
        desk.shelve("Gideon the Ninth", 3).await,
    ];
    let members: Vec<UserClaims> = (0..4).map(|_| claims(Role::Member)).collect();

    // Small LCG so the walk is reproducible
    let mut seed: u64 = 0x5eed;
    let mut next = move |bound: usize| {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((seed >> 33) as usize) % bound
    };

    let mut records: Vec<Uuid> = Vec::new();
    for _ in 0..300 {
        match next(4) {
            0 => {
                let member = &members[next(members.len())];
                let book_id = books[next(books.len())];
                if let Ok(borrow) = desk.request(member, book_id).await {
                    records.push(borrow.id);
                }
            }
            1 if !records.is_empty() => {
                let id = records[next(records.len())];
                let _ = desk.set_status(id, BorrowStatus::Borrowed).await;
            }
            2 if !records.is_empty() => {
                let id = records[next(records.len())];
                let _ = desk.set_status(id, BorrowStatus::Returned).await;
            }
            3 if !records.is_empty() => {
                let index = next(records.len());
                if desk.service.delete(&desk.librarian, records[index]).await.is_ok() {
                    records.swap_remove(index);
                }
            }
            _ => {}
        }

        for book_id in books {
            let book = desk.library.book(book_id);
            assert!(book.inventory().is_consistent(), "unbalanced counters: {:?}", book.inventory());
        }
    }

    for book_id in books {
        let book = desk.library.book(book_id);
        let query = BorrowQuery {
            status: Some(BorrowStatus::Borrowed),
            book_id: Some(book_id),
            per_page: Some(100),
            ..Default::default()
        };
        let (lent, _) = BorrowsRepository::search(desk.library.as_ref(), &query).await.unwrap();
        assert_eq!(book.borrows as usize, lent.len());
    }
}
