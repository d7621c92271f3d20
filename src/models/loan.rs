//! Loan (borrow) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::book::{Book, Pagination};
use super::user::User;

/// Loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Returned,
    ReturnedLate,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Returned => "returned",
            LoanStatus::ReturnedLate => "returned_late",
        }
    }

    /// Status of a loan closed at `returned_at`
    pub fn on_return(due_date: DateTime<Utc>, returned_at: DateTime<Utc>) -> Self {
        if returned_at > due_date {
            LoanStatus::ReturnedLate
        } else {
            LoanStatus::Returned
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LoanStatus::Active),
            "returned" => Ok(LoanStatus::Returned),
            "returned_late" => Ok(LoanStatus::ReturnedLate),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Loan record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == LoanStatus::Active && self.due_date < now
    }
}

/// Fields required to issue a loan
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Create loan request
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoan {
    pub book_id: Uuid,
    /// Defaults to the configured loan duration
    pub due_date: Option<DateTime<Utc>>,
}

/// Loan listing parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Store-level loan filter
#[derive(Debug, Clone)]
pub struct LoanFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<LoanStatus>,
    pub offset: i64,
    pub limit: i64,
}

/// Loan joined with its book and borrower
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub book: Book,
    pub user: User,
}

/// Loan joined with its book
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanWithBook {
    #[serde(flatten)]
    pub loan: Loan,
    pub book: Book,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanPage {
    pub data: Vec<LoanDetails>,
    pub pagination: Pagination,
}
