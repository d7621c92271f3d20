//! Authentication endpoints

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{
            CreateAdminRequest, CreateAdminResponse, LoginRequest, LoginResponse, MessageResponse,
            RefreshRequest, RefreshResponse, RegisterRequest, RegisterResponse,
        },
        User,
    },
    AppState,
};

use super::{AuthenticatedUser, RefreshingUser};

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Register a member account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Invalid input or email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    request.validate()?;

    let user = state.services.auth.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user_id: user.id,
        }),
    ))
}

/// Authenticate with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    request.validate()?;

    let response = state
        .services
        .auth
        .login(&request.email, &request.password)
        .await?;
    Ok(Json(response))
}

/// Exchange a refresh token for a new access token.
///
/// The bearer access token may be expired.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New tokens", body = RefreshResponse),
        (status = 401, description = "Refresh rejected; session may have been terminated", body = crate::error::ErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    RefreshingUser(claims): RefreshingUser,
    Json(request): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    request.validate()?;

    let response = state
        .services
        .auth
        .refresh_token(claims.user_id(), &request.refresh_token)
        .await?;
    Ok(Json(response))
}

/// End the current session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<MessageResponse>> {
    state.services.auth.logout(claims.user_id()).await?;
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// Get current user info
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User not found")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.auth.current_user(claims.user_id()).await?;
    Ok(Json(user))
}

/// Create an admin account. Requires the `X-Admin-Secret` header.
#[utoipa::path(
    post,
    path = "/api/auth/create-admin",
    tag = "auth",
    params(
        ("X-Admin-Secret" = String, Header, description = "Admin creation secret")
    ),
    request_body = CreateAdminRequest,
    responses(
        (status = 201, description = "Admin created", body = CreateAdminResponse),
        (status = 400, description = "Invalid input or email already registered"),
        (status = 401, description = "Invalid or missing admin secret")
    )
)]
pub async fn create_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateAdminRequest>,
) -> AppResult<(StatusCode, Json<CreateAdminResponse>)> {
    let expected = &state.config.auth.admin_secret;
    let presented = headers
        .get(ADMIN_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    match presented {
        Some(secret) if !expected.is_empty() && secret == expected.as_str() => {}
        _ => {
            tracing::warn!("Rejected admin creation with invalid secret");
            return Err(AppError::Authentication(
                "Invalid or missing admin secret".to_string(),
            ));
        }
    }

    request.validate()?;

    let user = state.services.auth.create_admin(request.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateAdminResponse {
            message: "Admin user created successfully".to_string(),
            user_id: user.id,
            role: user.role,
        }),
    ))
}
