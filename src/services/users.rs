//! User administration service

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{user::UpdateUser, User, UserClaims},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.repository.users.list().await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<User> {
        self.repository
            .users
            .find_by_id(id)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// Update a profile. Only the owner or an admin may do so, and only the
    /// display name can change here.
    pub async fn update(&self, id: Uuid, changes: UpdateUser, caller: &UserClaims) -> AppResult<User> {
        caller.require_self_or_admin(id)?;

        let current = self.get(id).await?;
        let Some(name) = changes.name else {
            return Ok(current);
        };

        self.repository
            .users
            .update_name(id, name.trim().to_string())
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// Remove a user. Their loans are kept.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        if !self.repository.users.delete(id).await? {
            return Err(AppError::UserNotFound);
        }
        tracing::info!("Deleted user {}", id);
        Ok(())
    }
}
