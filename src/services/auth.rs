//! Authentication and session service
//!
//! Access tokens are short-lived JWTs. Refresh tokens are opaque random
//! strings; only their bcrypt hash is stored on the user, together with the
//! id of the token family they belong to. Presenting a refresh token that
//! does not match the stored hash is treated as token theft and ends the
//! whole family.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        user::{LoginResponse, RefreshResponse, RegisterRequest, UserSummary},
        NewUser, Role, SessionGrant, TokenRotation, User, UserClaims,
    },
    repository::Repository,
};

use super::tokens::{self, RefreshTokenData};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

/// Emails are matched case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a member account
    pub async fn register(&self, request: RegisterRequest) -> AppResult<User> {
        self.create_user(request, Role::Member).await
    }

    /// Register an admin account. The caller checks the admin secret.
    pub async fn create_admin(&self, request: RegisterRequest) -> AppResult<User> {
        self.create_user(request, Role::Admin).await
    }

    async fn create_user(&self, request: RegisterRequest, role: Role) -> AppResult<User> {
        let email = normalize_email(&request.email);

        if self.repository.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::DuplicateEmail);
        }

        let password_hash = tokens::hash_secret(&request.password, self.config.bcrypt_cost)?;

        let user = self
            .repository
            .users
            .insert(NewUser {
                email,
                password_hash,
                name: request.name.trim().to_string(),
                role,
            })
            .await?;

        tracing::info!("Registered {} account {}", role, user.id);
        Ok(user)
    }

    /// Check credentials and open a new token family
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginResponse> {
        let user = self
            .repository
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !tokens::verify_secret(password, &user.password_hash) {
            return Err(AppError::InvalidCredentials);
        }

        let now = Utc::now();
        let access_token = self.create_access_token(&user, now)?;
        let refresh = self.create_refresh_token(tokens::new_family_id(), now)?;

        self.repository
            .users
            .start_session(
                user.id,
                SessionGrant {
                    refresh_token_hash: refresh.hashed_token,
                    family_id: refresh.family_id,
                    family_created_at: now,
                    expires_at: refresh.expires_at,
                    logged_in_at: now,
                },
            )
            .await?;

        tracing::info!("User {} logged in, token family {}", user.id, refresh.family_id);

        Ok(LoginResponse {
            access_token,
            refresh_token: refresh.token,
            user: UserSummary::from(&user),
        })
    }

    /// Exchange a refresh token for a new access token, rotating the
    /// refresh token when rotation is enabled
    pub async fn refresh_token(&self, user_id: Uuid, presented: &str) -> AppResult<RefreshResponse> {
        let user = self
            .repository
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let stored_hash = user
            .refresh_token_hash
            .clone()
            .ok_or(AppError::NoRefreshToken)?;

        if !tokens::verify_secret(presented, &stored_hash) {
            return Err(self.terminate_family(&user).await);
        }

        let now = Utc::now();

        if let Some(family_created_at) = user.token_family_created_at {
            if now - family_created_at > self.config.token_family_max_age() {
                return Err(AppError::TokenFamilyExpired);
            }
        }

        if let Some(expires_at) = user.refresh_token_expires_at {
            if expires_at < now {
                return Err(AppError::RefreshTokenExpired);
            }
        }

        let access_token = self.create_access_token(&user, now)?;

        if !self.config.refresh_token_rotation {
            return Ok(RefreshResponse {
                access_token,
                refresh_token: None,
            });
        }

        let family_id = user.token_family_id.unwrap_or_else(tokens::new_family_id);
        let refresh = self.create_refresh_token(family_id, now)?;

        let swapped = self
            .repository
            .users
            .rotate_refresh_token(
                user.id,
                stored_hash,
                TokenRotation {
                    refresh_token_hash: refresh.hashed_token,
                    expires_at: refresh.expires_at,
                    refreshed_at: now,
                },
            )
            .await?;

        // Another refresh consumed the same token first
        if !swapped {
            return Err(self.terminate_family(&user).await);
        }

        tracing::info!("Rotated refresh token of user {} in family {}", user.id, family_id);

        Ok(RefreshResponse {
            access_token,
            refresh_token: Some(refresh.token),
        })
    }

    async fn terminate_family(&self, user: &User) -> AppError {
        tracing::warn!(
            "Refresh token reuse detected for user {}, terminating token family {:?}",
            user.id,
            user.token_family_id
        );
        match self.repository.users.clear_session(user.id).await {
            Ok(()) => AppError::InvalidRefreshToken,
            Err(e) => e,
        }
    }

    /// End the session. Succeeds when no session is open.
    pub async fn logout(&self, user_id: Uuid) -> AppResult<()> {
        self.repository.users.clear_session(user_id).await?;
        tracing::info!("User {} logged out", user_id);
        Ok(())
    }

    pub async fn current_user(&self, user_id: Uuid) -> AppResult<User> {
        self.repository
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// Sign an access token for `user`
    pub fn create_access_token(&self, user: &User, now: DateTime<Utc>) -> AppResult<String> {
        UserClaims::for_user(user, now, self.config.access_token_ttl())
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Mint a refresh token in `family_id`
    pub fn create_refresh_token(&self, family_id: Uuid, now: DateTime<Utc>) -> AppResult<RefreshTokenData> {
        tokens::create_refresh_token(
            family_id,
            now,
            self.config.refresh_token_ttl(),
            self.config.bcrypt_cost,
        )
    }
}
