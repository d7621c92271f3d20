//! API handlers for Libris REST endpoints

pub mod auth;
pub mod books;
pub mod health;
pub mod loans;
pub mod openapi;
pub mod users;

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts},
    http::request::Parts,
    routing::{get, patch, post},
    Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{error::AppError, models::UserClaims, AppState};

/// Headroom over the file size for multipart framing and other fields
const MULTIPART_OVERHEAD: usize = 64 * 1024;

async fn bearer_token(parts: &mut Parts, state: &AppState) -> Result<String, AppError> {
    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Authentication("Missing or invalid authorization header".to_string()))?;
    Ok(bearer.token().to_string())
}

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts, state).await?;

        let claims = UserClaims::from_token(&token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Like [`AuthenticatedUser`] but accepts an expired access token, as
/// presented when asking for a refresh. The signature is still checked.
pub struct RefreshingUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for RefreshingUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts, state).await?;

        let claims = UserClaims::from_token_allow_expired(&token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))?;

        Ok(RefreshingUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let cover_limit = state.config.uploads.max_file_bytes + MULTIPART_OVERHEAD;

    let api = Router::new()
        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/create-admin", post(auth::create_admin))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .patch(books::update_book)
                .delete(books::delete_book),
        )
        .route(
            "/books/:id/cover",
            post(books::upload_cover).layer(DefaultBodyLimit::max(cover_limit)),
        )
        // Users
        .route("/users", get(users::list_users))
        .route(
            "/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::create_loan))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/return", patch(loans::return_loan))
        .route("/loans/user/:user_id", get(loans::get_user_loans));

    let uploads = ServeDir::new(&state.config.uploads.dir);
    let uploads_prefix = state.config.uploads.public_prefix.clone();

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api", api)
        .with_state(state)
        .nest_service(&uploads_prefix, uploads)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
