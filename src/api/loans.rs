//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        loan::LoanPage, CreateLoan, Loan, LoanDetails, LoanQuery, LoanWithBook,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List loans (own loans, or all for admins)
#[utoipa::path(
    get,
    path = "/api/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Page of loans", body = LoanPage),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<LoanPage>> {
    let page = state.services.loans.get_all(query, &claims).await?;
    Ok(Json(page))
}

/// Get loan details by ID
#[utoipa::path(
    get,
    path = "/api/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.get_by_id(id, &claims).await?;
    Ok(Json(loan))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/api/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 400, description = "Book unavailable, already borrowed, or overdue loans exist"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let loan = state.services.loans.create(request, &claims).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed book
#[utoipa::path(
    patch,
    path = "/api/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan closed", body = Loan),
        (status = 400, description = "Loan is not active"),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.return_book(id, &claims).await?;
    Ok(Json(loan))
}

/// Get loans of a user (self or admin)
#[utoipa::path(
    get,
    path = "/api/loans/user/{user_id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Loans of the user", body = Vec<LoanWithBook>),
        (status = 403, description = "Not the user")
    )
)]
pub async fn get_user_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<LoanWithBook>>> {
    let loans = state.services.loans.get_user_loans(user_id, &claims).await?;
    Ok(Json(loans))
}
