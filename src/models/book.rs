//! Book (catalog) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Catalog entry with its stock counters
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publisher: Option<String>,
    pub published_year: Option<i32>,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Public URL of the cover image
    pub cover_image: Option<String>,
    pub total_stock: i32,
    pub available_stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const STOCK_OUT_OF_RANGE: &str = "Available stock must be between 0 and total stock";

impl Book {
    /// Stock counters must satisfy `0 <= available <= total`
    pub fn check_stock(&self) -> AppResult<()> {
        if self.available_stock < 0 || self.available_stock > self.total_stock {
            return Err(AppError::Validation(STOCK_OUT_OF_RANGE.to_string()));
        }
        Ok(())
    }
}

/// Create book request. Available stock starts equal to total stock.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
    pub publisher: Option<String>,
    pub published_year: Option<i32>,
    pub category: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Total stock cannot be negative"))]
    pub total_stock: i32,
}

/// Partial book update
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Author cannot be empty"))]
    pub author: Option<String>,
    #[validate(length(min = 1, message = "ISBN cannot be empty"))]
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub published_year: Option<i32>,
    pub category: Option<String>,
    pub description: Option<String>,
    #[serde(skip)]
    pub cover_image: Option<String>,
    #[validate(range(min = 0, message = "Total stock cannot be negative"))]
    pub total_stock: Option<i32>,
    #[validate(range(min = 0, message = "Available stock cannot be negative"))]
    pub available_stock: Option<i32>,
}

impl UpdateBook {
    /// Apply the present fields onto `book`
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(ref title) = self.title {
            book.title = title.clone();
        }
        if let Some(ref author) = self.author {
            book.author = author.clone();
        }
        if let Some(ref isbn) = self.isbn {
            book.isbn = isbn.clone();
        }
        if self.publisher.is_some() {
            book.publisher = self.publisher.clone();
        }
        if self.published_year.is_some() {
            book.published_year = self.published_year;
        }
        if self.category.is_some() {
            book.category = self.category.clone();
        }
        if self.description.is_some() {
            book.description = self.description.clone();
        }
        if self.cover_image.is_some() {
            book.cover_image = self.cover_image.clone();
        }
        if let Some(total) = self.total_stock {
            book.total_stock = total;
        }
        if let Some(available) = self.available_stock {
            book.available_stock = available;
        }
    }
}

/// Book search parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Free text over title, author, ISBN and description
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// Resolved page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Clamp raw query values: page >= 1, 1 <= limit <= max
    pub fn resolve(page: Option<i64>, limit: Option<i64>, default_limit: i64, max_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit.max(1)),
        }
    }

    /// Saturates for absurd page numbers, which then simply match nothing
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookPage {
    pub data: Vec<Book>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CoverResponse {
    pub cover_url: String,
}
