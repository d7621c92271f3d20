//! Users repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{NewUser, SessionGrant, TokenRotation, User},
};

use super::{is_unique_violation, UsersStore};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsersStore for UsersRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_many(&self, ids: Vec<Uuid>) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn insert(&self, user: NewUser) -> AppResult<User> {
        let now = Utc::now();

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.role)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "users_email_key") {
                AppError::DuplicateEmail
            } else {
                AppError::Database(e)
            }
        })
    }

    async fn update_name(&self, id: Uuid, name: String) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn start_session(&self, id: Uuid, grant: SessionGrant) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $2,
                token_family_id = $3,
                token_family_created_at = $4,
                refresh_token_expires_at = $5,
                last_login_at = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&grant.refresh_token_hash)
        .bind(grant.family_id)
        .bind(grant.family_created_at)
        .bind(grant.expires_at)
        .bind(grant.logged_in_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected_hash: String,
        rotation: TokenRotation,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $3,
                refresh_token_expires_at = $4,
                last_token_refresh_at = $5
            WHERE id = $1 AND refresh_token_hash = $2
            "#,
        )
        .bind(id)
        .bind(&expected_hash)
        .bind(&rotation.refresh_token_hash)
        .bind(rotation.expires_at)
        .bind(rotation.refreshed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear_session(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE users SET refresh_token_hash = NULL, token_family_id = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
