//! Business logic services

pub mod auth;
pub mod catalog;
pub mod loans;
pub mod tokens;
pub mod uploads;
pub mod users;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    repository: Repository,
}

impl Services {
    /// Create all services over the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let covers = uploads::CoverStorage::new(&config.uploads);

        Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            users: users::UsersService::new(repository.clone()),
            catalog: catalog::CatalogService::new(
                repository.clone(),
                config.pagination.clone(),
                covers,
            ),
            loans: loans::LoansService::new(
                repository.clone(),
                config.loans.clone(),
                config.pagination.clone(),
            ),
            repository,
        }
    }

    /// Whether the backing store answers
    pub async fn ready(&self) -> crate::error::AppResult<()> {
        self.repository.ping().await
    }
}
