//! Secret hashing and refresh-token generation

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Random bytes in a refresh token (hex encoded, 64 chars)
const REFRESH_TOKEN_BYTES: usize = 32;

/// A freshly minted refresh token. Only the hash is stored.
#[derive(Debug, Clone)]
pub struct RefreshTokenData {
    pub token: String,
    pub hashed_token: String,
    pub family_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Opaque random refresh token
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn new_family_id() -> Uuid {
    Uuid::new_v4()
}

/// Salted bcrypt hash of a password or refresh token
pub fn hash_secret(secret: &str, cost: u32) -> AppResult<String> {
    bcrypt::hash(secret, cost).map_err(|e| AppError::Internal(format!("Hashing failed: {}", e)))
}

/// Compare a secret with a stored hash. Malformed hashes never match.
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    bcrypt::verify(secret, hash).unwrap_or(false)
}

/// Mint a token for `family_id`, expiring `ttl` from `now`
pub fn create_refresh_token(
    family_id: Uuid,
    now: DateTime<Utc>,
    ttl: Duration,
    cost: u32,
) -> AppResult<RefreshTokenData> {
    let token = generate_refresh_token();
    let hashed_token = hash_secret(&token, cost)?;
    Ok(RefreshTokenData {
        token,
        hashed_token,
        family_id,
        expires_at: now + ttl,
    })
}
