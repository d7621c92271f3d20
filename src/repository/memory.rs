//! In-process store used for local runs and tests
//!
//! All three collections sit behind one lock so that loan issue and return
//! touch the loan and the book stock as a single step.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        Book, BookQuery, Loan, LoanFilter, LoanStatus, NewLoan, NewUser, SessionGrant,
        TokenRotation, UpdateBook, User,
    },
};

use super::{BooksStore, LoansStore, UsersStore};

#[derive(Default)]
struct Collections {
    users: HashMap<Uuid, User>,
    books: HashMap<Uuid, Book>,
    loans: HashMap<Uuid, Loan>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

/// Newest first, ties broken by id so pages are stable
fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (DateTime<Utc>, Uuid),
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn paginate<T>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

fn book_matches(book: &Book, query: &BookQuery) -> bool {
    if let Some(ref category) = query.category {
        if book.category.as_deref() != Some(category.as_str()) {
            return false;
        }
    }
    if let Some(ref search) = query.search {
        let needle = search.to_lowercase();
        let hit = |field: &str| field.to_lowercase().contains(&needle);
        if !(hit(&book.title)
            || hit(&book.author)
            || hit(&book.isbn)
            || book.description.as_deref().map(hit).unwrap_or(false))
        {
            return false;
        }
    }
    true
}

#[async_trait]
impl UsersStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let data = self.inner.lock().await;
        Ok(data.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let data = self.inner.lock().await;
        Ok(data.users.get(&id).cloned())
    }

    async fn find_many(&self, ids: Vec<Uuid>) -> AppResult<Vec<User>> {
        let data = self.inner.lock().await;
        Ok(ids.iter().filter_map(|id| data.users.get(id).cloned()).collect())
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        let data = self.inner.lock().await;
        let mut users: Vec<User> = data.users.values().cloned().collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users)
    }

    async fn insert(&self, user: NewUser) -> AppResult<User> {
        let mut data = self.inner.lock().await;
        if data.users.values().any(|u| u.email == user.email) {
            return Err(AppError::DuplicateEmail);
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            role: user.role,
            refresh_token_hash: None,
            token_family_id: None,
            token_family_created_at: None,
            refresh_token_expires_at: None,
            last_login_at: None,
            last_token_refresh_at: None,
            created_at: now,
            updated_at: now,
        };
        data.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_name(&self, id: Uuid, name: String) -> AppResult<Option<User>> {
        let mut data = self.inner.lock().await;
        Ok(data.users.get_mut(&id).map(|user| {
            user.name = name;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut data = self.inner.lock().await;
        Ok(data.users.remove(&id).is_some())
    }

    async fn start_session(&self, id: Uuid, grant: SessionGrant) -> AppResult<()> {
        let mut data = self.inner.lock().await;
        if let Some(user) = data.users.get_mut(&id) {
            user.refresh_token_hash = Some(grant.refresh_token_hash);
            user.token_family_id = Some(grant.family_id);
            user.token_family_created_at = Some(grant.family_created_at);
            user.refresh_token_expires_at = Some(grant.expires_at);
            user.last_login_at = Some(grant.logged_in_at);
        }
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected_hash: String,
        rotation: TokenRotation,
    ) -> AppResult<bool> {
        let mut data = self.inner.lock().await;
        match data.users.get_mut(&id) {
            Some(user) if user.refresh_token_hash.as_deref() == Some(expected_hash.as_str()) => {
                user.refresh_token_hash = Some(rotation.refresh_token_hash);
                user.refresh_token_expires_at = Some(rotation.expires_at);
                user.last_token_refresh_at = Some(rotation.refreshed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_session(&self, id: Uuid) -> AppResult<()> {
        let mut data = self.inner.lock().await;
        if let Some(user) = data.users.get_mut(&id) {
            user.refresh_token_hash = None;
            user.token_family_id = None;
        }
        Ok(())
    }
}

#[async_trait]
impl BooksStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Book>> {
        let data = self.inner.lock().await;
        Ok(data.books.get(&id).cloned())
    }

    async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        let data = self.inner.lock().await;
        Ok(data.books.values().find(|b| b.isbn == isbn).cloned())
    }

    async fn find_many(&self, ids: Vec<Uuid>) -> AppResult<Vec<Book>> {
        let data = self.inner.lock().await;
        Ok(ids.iter().filter_map(|id| data.books.get(id).cloned()).collect())
    }

    async fn search(&self, query: BookQuery, offset: i64, limit: i64) -> AppResult<(Vec<Book>, i64)> {
        let data = self.inner.lock().await;
        let mut books: Vec<Book> = data
            .books
            .values()
            .filter(|b| book_matches(b, &query))
            .cloned()
            .collect();
        let total = books.len() as i64;
        newest_first(&mut books, |b| (b.created_at, b.id));
        Ok((paginate(books, offset, limit), total))
    }

    async fn insert(&self, book: Book) -> AppResult<Book> {
        let mut data = self.inner.lock().await;
        if data.books.values().any(|b| b.isbn == book.isbn) {
            return Err(AppError::DuplicateIsbn);
        }
        data.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update(&self, id: Uuid, changes: UpdateBook) -> AppResult<Option<Book>> {
        let mut data = self.inner.lock().await;
        if let Some(ref isbn) = changes.isbn {
            if data.books.values().any(|b| b.id != id && &b.isbn == isbn) {
                return Err(AppError::DuplicateIsbn);
            }
        }
        let Some(book) = data.books.get_mut(&id) else {
            return Ok(None);
        };

        let mut updated = book.clone();
        changes.apply_to(&mut updated);
        updated.check_stock()?;
        updated.updated_at = Utc::now();
        *book = updated.clone();
        Ok(Some(updated))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut data = self.inner.lock().await;
        if !data.books.contains_key(&id) {
            return Ok(false);
        }
        if data
            .loans
            .values()
            .any(|l| l.book_id == id && l.status == LoanStatus::Active)
        {
            return Err(AppError::ActiveLoansPreventDeletion);
        }
        data.books.remove(&id);
        Ok(true)
    }
}

#[async_trait]
impl LoansStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Loan>> {
        let data = self.inner.lock().await;
        Ok(data.loans.get(&id).cloned())
    }

    async fn find_active(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Loan>> {
        let data = self.inner.lock().await;
        Ok(data
            .loans
            .values()
            .find(|l| l.user_id == user_id && l.book_id == book_id && l.status == LoanStatus::Active)
            .cloned())
    }

    async fn count_overdue(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<i64> {
        let data = self.inner.lock().await;
        Ok(data
            .loans
            .values()
            .filter(|l| l.user_id == user_id && l.is_overdue(now))
            .count() as i64)
    }

    async fn issue(&self, loan: NewLoan) -> AppResult<Loan> {
        let mut data = self.inner.lock().await;

        match data.books.get(&loan.book_id) {
            None => return Err(AppError::BookNotFound),
            Some(book) if book.available_stock <= 0 => return Err(AppError::BookUnavailable),
            Some(_) => {}
        }
        if data.loans.values().any(|l| {
            l.user_id == loan.user_id && l.book_id == loan.book_id && l.status == LoanStatus::Active
        }) {
            return Err(AppError::DuplicateActiveLoan);
        }

        if let Some(book) = data.books.get_mut(&loan.book_id) {
            book.available_stock -= 1;
            book.updated_at = loan.borrow_date;
        }

        let created = Loan {
            id: Uuid::new_v4(),
            user_id: loan.user_id,
            book_id: loan.book_id,
            borrow_date: loan.borrow_date,
            due_date: loan.due_date,
            return_date: None,
            status: LoanStatus::Active,
            created_at: loan.borrow_date,
            updated_at: loan.borrow_date,
        };
        data.loans.insert(created.id, created.clone());
        Ok(created)
    }

    async fn close(
        &self,
        id: Uuid,
        returned_at: DateTime<Utc>,
        status: LoanStatus,
    ) -> AppResult<Option<Loan>> {
        let mut data = self.inner.lock().await;

        let closed = match data.loans.get_mut(&id) {
            Some(loan) if loan.status == LoanStatus::Active => {
                loan.status = status;
                loan.return_date = Some(returned_at);
                loan.updated_at = returned_at;
                loan.clone()
            }
            _ => return Ok(None),
        };

        match data.books.get_mut(&closed.book_id) {
            Some(book) if book.available_stock < book.total_stock => {
                book.available_stock += 1;
                book.updated_at = returned_at;
            }
            _ => tracing::warn!(
                "Loan {} returned but book {} is missing or already fully stocked",
                closed.id,
                closed.book_id
            ),
        }

        Ok(Some(closed))
    }

    async fn search(&self, filter: LoanFilter) -> AppResult<(Vec<Loan>, i64)> {
        let data = self.inner.lock().await;
        let mut loans: Vec<Loan> = data
            .loans
            .values()
            .filter(|l| filter.user_id.map_or(true, |id| l.user_id == id))
            .filter(|l| filter.status.map_or(true, |s| l.status == s))
            .cloned()
            .collect();
        let total = loans.len() as i64;
        newest_first(&mut loans, |l| (l.created_at, l.id));
        Ok((paginate(loans, filter.offset, filter.limit), total))
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Loan>> {
        let data = self.inner.lock().await;
        let mut loans: Vec<Loan> = data
            .loans
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut loans, |l| (l.created_at, l.id));
        Ok(loans)
    }
}
