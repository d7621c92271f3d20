//! Loan management service
//!
//! A loan is `active` from the moment it is issued until the book comes back,
//! at which point it becomes `returned` or `returned_late`. Closed loans are
//! kept forever.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    config::{LoansConfig, PaginationConfig},
    error::{AppError, AppResult},
    models::{
        loan::LoanPage, CreateLoan, Loan, LoanDetails, LoanFilter, LoanQuery, LoanStatus,
        LoanWithBook, NewLoan, PageRequest, Pagination, UserClaims,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    config: LoansConfig,
    pagination: PaginationConfig,
}

impl LoansService {
    pub fn new(repository: Repository, config: LoansConfig, pagination: PaginationConfig) -> Self {
        Self {
            repository,
            config,
            pagination,
        }
    }

    /// Borrow a book for the caller
    pub async fn create(&self, request: CreateLoan, caller: &UserClaims) -> AppResult<Loan> {
        let user_id = caller.user_id();

        let book = self
            .repository
            .books
            .find_by_id(request.book_id)
            .await?
            .ok_or(AppError::BookNotFound)?;

        if book.available_stock <= 0 {
            return Err(AppError::BookUnavailable);
        }

        if self
            .repository
            .loans
            .find_active(user_id, book.id)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateActiveLoan);
        }

        let now = Utc::now();
        if self.repository.loans.count_overdue(user_id, now).await? > 0 {
            return Err(AppError::OverdueLoansExist);
        }

        let due_date = request
            .due_date
            .unwrap_or_else(|| now + Duration::days(self.config.default_duration_days));

        // The store re-checks stock and uniqueness atomically
        let loan = self
            .repository
            .loans
            .issue(NewLoan {
                user_id,
                book_id: book.id,
                borrow_date: now,
                due_date,
            })
            .await?;

        tracing::info!("Loan {} issued: book {} to user {}", loan.id, book.id, user_id);
        Ok(loan)
    }

    /// Close an active loan and put the copy back on the shelf
    pub async fn return_book(&self, loan_id: Uuid, caller: &UserClaims) -> AppResult<Loan> {
        let loan = self
            .repository
            .loans
            .find_by_id(loan_id)
            .await?
            .ok_or(AppError::LoanNotFound)?;

        caller.require_self_or_admin(loan.user_id)?;

        if loan.status != LoanStatus::Active {
            return Err(AppError::LoanNotActive);
        }

        let now = Utc::now();
        let status = LoanStatus::on_return(loan.due_date, now);

        let closed = self
            .repository
            .loans
            .close(loan_id, now, status)
            .await?
            .ok_or(AppError::LoanNotActive)?;

        tracing::info!("Loan {} closed as {}", closed.id, closed.status);
        Ok(closed)
    }

    /// List loans, restricted to the caller's own unless admin
    pub async fn get_all(&self, query: LoanQuery, caller: &UserClaims) -> AppResult<LoanPage> {
        let page = PageRequest::resolve(
            query.page,
            query.limit,
            self.pagination.default_page_size,
            self.pagination.max_page_size,
        );
        let filter = LoanFilter {
            user_id: (!caller.is_admin()).then(|| caller.user_id()),
            status: query.status,
            offset: page.offset(),
            limit: page.limit,
        };

        let (loans, total) = self.repository.loans.search(filter).await?;
        let data = self.with_details(loans).await?;

        Ok(LoanPage {
            data,
            pagination: Pagination::new(page.page, page.limit, total),
        })
    }

    pub async fn get_by_id(&self, id: Uuid, caller: &UserClaims) -> AppResult<LoanDetails> {
        let loan = self
            .repository
            .loans
            .find_by_id(id)
            .await?
            .ok_or(AppError::LoanNotFound)?;

        caller.require_self_or_admin(loan.user_id)?;

        self.with_details(vec![loan])
            .await?
            .pop()
            .ok_or(AppError::LoanNotFound)
    }

    /// All loans of `user_id` with their books
    pub async fn get_user_loans(&self, user_id: Uuid, caller: &UserClaims) -> AppResult<Vec<LoanWithBook>> {
        caller.require_self_or_admin(user_id)?;

        let loans = self.repository.loans.list_for_user(user_id).await?;
        let books = self
            .repository
            .books
            .find_many(unique_ids(loans.iter().map(|l| l.book_id)))
            .await?;
        let books: HashMap<Uuid, _> = books.into_iter().map(|b| (b.id, b)).collect();

        Ok(loans
            .into_iter()
            .filter_map(|loan| {
                let book = books.get(&loan.book_id)?.clone();
                Some(LoanWithBook { loan, book })
            })
            .collect())
    }

    /// Join loans with their book and borrower. Loans whose book or user no
    /// longer exists are left out.
    async fn with_details(&self, loans: Vec<Loan>) -> AppResult<Vec<LoanDetails>> {
        let books = self
            .repository
            .books
            .find_many(unique_ids(loans.iter().map(|l| l.book_id)))
            .await?;
        let users = self
            .repository
            .users
            .find_many(unique_ids(loans.iter().map(|l| l.user_id)))
            .await?;

        let books: HashMap<Uuid, _> = books.into_iter().map(|b| (b.id, b)).collect();
        let users: HashMap<Uuid, _> = users.into_iter().map(|u| (u.id, u)).collect();

        Ok(loans
            .into_iter()
            .filter_map(|loan| {
                let book = books.get(&loan.book_id)?.clone();
                let user = users.get(&loan.user_id)?.clone();
                Some(LoanDetails { loan, book, user })
            })
            .collect())
    }
}

fn unique_ids(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    ids.collect::<HashSet<_>>().into_iter().collect()
}
