//! Loans repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Loan, LoanFilter, LoanStatus, NewLoan},
};

use super::{is_unique_violation, LoansStore};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoansStore for LoansRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(loan)
    }

    async fn find_active(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE user_id = $1 AND book_id = $2 AND status = 'active'",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(loan)
    }

    async fn count_overdue(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND status = 'active' AND due_date < $2",
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn issue(&self, loan: NewLoan) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        // Decrement only while stock remains; concurrent borrowers of the
        // last copy serialize on the row lock.
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE books
            SET available_stock = available_stock - 1, updated_at = NOW()
            WHERE id = $1 AND available_stock > 0
            RETURNING available_stock
            "#,
        )
        .bind(loan.book_id)
        .fetch_optional(&mut *tx)
        .await?;

        if remaining.is_none() {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
                .bind(loan.book_id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists {
                AppError::BookUnavailable
            } else {
                AppError::BookNotFound
            });
        }

        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (
                id, user_id, book_id, borrow_date, due_date, return_date, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, NULL, 'active', $4, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(loan.user_id)
        .bind(loan.book_id)
        .bind(loan.borrow_date)
        .bind(loan.due_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "loans_one_active_per_user_book") {
                AppError::DuplicateActiveLoan
            } else {
                AppError::Database(e)
            }
        })?;

        tx.commit().await?;

        Ok(created)
    }

    async fn close(
        &self,
        id: Uuid,
        returned_at: DateTime<Utc>,
        status: LoanStatus,
    ) -> AppResult<Option<Loan>> {
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = $2, return_date = $3, updated_at = $3
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(returned_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(loan) = closed else {
            return Ok(None);
        };

        let restocked = sqlx::query(
            r#"
            UPDATE books
            SET available_stock = available_stock + 1, updated_at = NOW()
            WHERE id = $1 AND available_stock < total_stock
            "#,
        )
        .bind(loan.book_id)
        .execute(&mut *tx)
        .await?;

        if restocked.rows_affected() == 0 {
            tracing::warn!(
                "Loan {} returned but book {} is missing or already fully stocked",
                loan.id,
                loan.book_id
            );
        }

        tx.commit().await?;

        Ok(Some(loan))
    }

    async fn search(&self, filter: LoanFilter) -> AppResult<(Vec<Loan>, i64)> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM loans
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.status)
        .fetch_one(&self.pool)
        .await?;

        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.status)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((loans, total))
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }
}
