//! Repository layer: store interfaces and their backends
//!
//! Services only see the traits below. The process entry point picks a
//! backend (PostgreSQL or in-memory) and hands a [`Repository`] to them.

pub mod books;
pub mod loans;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        Book, BookQuery, Loan, LoanFilter, LoanStatus, NewLoan, NewUser, SessionGrant,
        TokenRotation, UpdateBook, User,
    },
};

/// Users collection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_many(&self, ids: Vec<Uuid>) -> AppResult<Vec<User>>;

    async fn list(&self) -> AppResult<Vec<User>>;

    /// Fails with `DuplicateEmail` if the email is taken
    async fn insert(&self, user: NewUser) -> AppResult<User>;

    async fn update_name(&self, id: Uuid, name: String) -> AppResult<Option<User>>;

    /// Returns false if no such user
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Start a new token family, replacing any previous session
    async fn start_session(&self, id: Uuid, grant: SessionGrant) -> AppResult<()>;

    /// Replace the stored refresh-token hash only if it still equals
    /// `expected_hash`. Returns whether the swap happened.
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected_hash: String,
        rotation: TokenRotation,
    ) -> AppResult<bool>;

    /// Drop the refresh-token hash and family id
    async fn clear_session(&self, id: Uuid) -> AppResult<()>;
}

/// Books collection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BooksStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Book>>;

    async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>>;

    async fn find_many(&self, ids: Vec<Uuid>) -> AppResult<Vec<Book>>;

    /// Returns the page of books and the total match count
    async fn search(&self, query: BookQuery, offset: i64, limit: i64) -> AppResult<(Vec<Book>, i64)>;

    /// Fails with `DuplicateIsbn` if the ISBN is taken
    async fn insert(&self, book: Book) -> AppResult<Book>;

    /// Applies `changes` only if the resulting stock stays within
    /// `0 <= available <= total`, else fails with `Validation`. Returns None
    /// if no such book.
    async fn update(&self, id: Uuid, changes: UpdateBook) -> AppResult<Option<Book>>;

    /// Fails with `ActiveLoansPreventDeletion` while any active loan
    /// references the book. Returns false if no such book.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

/// Loans collection. Issue and close also adjust the book's stock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoansStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Loan>>;

    async fn find_active(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Loan>>;

    /// Active loans of `user_id` due before `now`
    async fn count_overdue(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<i64>;

    /// Atomically take one unit of stock and record the loan.
    ///
    /// Fails with `BookNotFound`, `BookUnavailable` (no stock left) or
    /// `DuplicateActiveLoan`; on failure nothing is written.
    async fn issue(&self, loan: NewLoan) -> AppResult<Loan>;

    /// Atomically move an active loan to `status` and give its unit of stock
    /// back. Returns None if the loan was not active anymore.
    async fn close(
        &self,
        id: Uuid,
        returned_at: DateTime<Utc>,
        status: LoanStatus,
    ) -> AppResult<Option<Loan>>;

    /// Newest first, with the total match count
    async fn search(&self, filter: LoanFilter) -> AppResult<(Vec<Loan>, i64)>;

    /// All loans of a user, newest first
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Loan>>;
}

/// Store handle injected into every service
#[derive(Clone)]
pub struct Repository {
    pool: Option<Pool<Postgres>>,
    pub users: Arc<dyn UsersStore>,
    pub books: Arc<dyn BooksStore>,
    pub loans: Arc<dyn LoansStore>,
}

impl Repository {
    pub fn new(
        users: Arc<dyn UsersStore>,
        books: Arc<dyn BooksStore>,
        loans: Arc<dyn LoansStore>,
    ) -> Self {
        Self {
            pool: None,
            users,
            books,
            loans,
        }
    }

    /// PostgreSQL backend over a shared pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            users: Arc::new(users::UsersRepository::new(pool.clone())),
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            loans: Arc::new(loans::LoansRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Fresh, empty in-process backend
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            pool: None,
            users: store.clone(),
            books: store.clone(),
            loans: store,
        }
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(ref pool) = self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}

/// Whether `err` is a unique-constraint violation on `constraint`
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}
