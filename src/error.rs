//! Error types for Libris server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric codes exposed to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthenticated = 2,
    NotAuthorized = 3,
    DbFailure = 4,
    BadValue = 5,
    DuplicateEmail = 10,
    DuplicateIsbn = 11,
    InvalidCredentials = 12,
    NoSuchUser = 20,
    NoSuchBook = 21,
    NoSuchLoan = 22,
    NoRefreshToken = 30,
    InvalidRefreshToken = 31,
    TokenFamilyExpired = 32,
    RefreshTokenExpired = 33,
    BookUnavailable = 40,
    DuplicateActiveLoan = 41,
    OverdueLoansExist = 42,
    LoanNotActive = 43,
    ActiveLoansPreventDeletion = 44,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Book with this ISBN already exists")]
    DuplicateIsbn,

    /// Same message whether the email is unknown or the password is wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Book not found")]
    BookNotFound,

    #[error("Loan not found")]
    LoanNotFound,

    #[error("No refresh token found. Please log in again.")]
    NoRefreshToken,

    /// Raised after the whole token family has been revoked.
    #[error("Invalid refresh token. Session terminated for security.")]
    InvalidRefreshToken,

    #[error("Token family expired. Please log in again.")]
    TokenFamilyExpired,

    #[error("Refresh token expired. Please log in again.")]
    RefreshTokenExpired,

    #[error("Book is not available for loan")]
    BookUnavailable,

    #[error("You already have an active loan for this book")]
    DuplicateActiveLoan,

    #[error("You have overdue loans. Please return them first.")]
    OverdueLoansExist,

    #[error("Loan is not active")]
    LoanNotActive,

    #[error("Forbidden")]
    Forbidden,

    #[error("Cannot delete book with active loans")]
    ActiveLoansPreventDeletion,

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and client-facing code for this error
    pub fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::DuplicateEmail => (StatusCode::BAD_REQUEST, ErrorCode::DuplicateEmail),
            AppError::DuplicateIsbn => (StatusCode::BAD_REQUEST, ErrorCode::DuplicateIsbn),
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, ErrorCode::InvalidCredentials)
            }
            AppError::UserNotFound => (StatusCode::NOT_FOUND, ErrorCode::NoSuchUser),
            AppError::BookNotFound => (StatusCode::NOT_FOUND, ErrorCode::NoSuchBook),
            AppError::LoanNotFound => (StatusCode::NOT_FOUND, ErrorCode::NoSuchLoan),
            AppError::NoRefreshToken => (StatusCode::UNAUTHORIZED, ErrorCode::NoRefreshToken),
            AppError::InvalidRefreshToken => {
                (StatusCode::UNAUTHORIZED, ErrorCode::InvalidRefreshToken)
            }
            AppError::TokenFamilyExpired => {
                (StatusCode::UNAUTHORIZED, ErrorCode::TokenFamilyExpired)
            }
            AppError::RefreshTokenExpired => {
                (StatusCode::UNAUTHORIZED, ErrorCode::RefreshTokenExpired)
            }
            AppError::BookUnavailable => (StatusCode::BAD_REQUEST, ErrorCode::BookUnavailable),
            AppError::DuplicateActiveLoan => {
                (StatusCode::BAD_REQUEST, ErrorCode::DuplicateActiveLoan)
            }
            AppError::OverdueLoansExist => {
                (StatusCode::BAD_REQUEST, ErrorCode::OverdueLoansExist)
            }
            AppError::LoanNotActive => (StatusCode::BAD_REQUEST, ErrorCode::LoanNotActive),
            AppError::Forbidden => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::ActiveLoansPreventDeletion => {
                (StatusCode::BAD_REQUEST, ErrorCode::ActiveLoansPreventDeletion)
            }
            AppError::Authentication(_) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthenticated)
            }
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
