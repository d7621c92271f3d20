//! Catalog management service

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::PaginationConfig,
    error::{AppError, AppResult},
    models::{
        book::BookPage, Book, BookQuery, CreateBook, PageRequest, Pagination, UpdateBook,
    },
    repository::Repository,
};

use super::uploads::CoverStorage;

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    pagination: PaginationConfig,
    covers: CoverStorage,
}

impl CatalogService {
    pub fn new(repository: Repository, pagination: PaginationConfig, covers: CoverStorage) -> Self {
        Self {
            repository,
            pagination,
            covers,
        }
    }

    /// Search books, newest first
    pub async fn search(&self, query: BookQuery) -> AppResult<BookPage> {
        let page = PageRequest::resolve(
            query.page,
            query.limit,
            self.pagination.default_page_size,
            self.pagination.max_page_size,
        );
        let (data, total) = self
            .repository
            .books
            .search(query, page.offset(), page.limit)
            .await?;

        Ok(BookPage {
            data,
            pagination: Pagination::new(page.page, page.limit, total),
        })
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Book> {
        self.repository
            .books
            .find_by_id(id)
            .await?
            .ok_or(AppError::BookNotFound)
    }

    /// Add a book. All copies start available.
    pub async fn create(&self, book: CreateBook) -> AppResult<Book> {
        let isbn = book.isbn.trim().to_string();
        if self.repository.books.find_by_isbn(&isbn).await?.is_some() {
            return Err(AppError::DuplicateIsbn);
        }

        let now = Utc::now();
        let created = self
            .repository
            .books
            .insert(Book {
                id: Uuid::new_v4(),
                title: book.title,
                author: book.author,
                isbn,
                publisher: book.publisher,
                published_year: book.published_year,
                category: book.category,
                description: book.description,
                cover_image: None,
                total_stock: book.total_stock,
                available_stock: book.total_stock,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!("Created book {} ({})", created.id, created.isbn);
        Ok(created)
    }

    /// Partial update. The store refuses changes that would leave stock
    /// outside `0 <= available <= total`.
    pub async fn update(&self, id: Uuid, mut changes: UpdateBook) -> AppResult<Book> {
        let current = self.get(id).await?;

        if let Some(ref isbn) = changes.isbn {
            let isbn = isbn.trim().to_string();
            if isbn != current.isbn && self.repository.books.find_by_isbn(&isbn).await?.is_some() {
                return Err(AppError::DuplicateIsbn);
            }
            changes.isbn = Some(isbn);
        }

        self.repository
            .books
            .update(id, changes)
            .await?
            .ok_or(AppError::BookNotFound)
    }

    /// Remove a book that nobody is currently borrowing
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        if !self.repository.books.delete(id).await? {
            return Err(AppError::BookNotFound);
        }
        tracing::info!("Deleted book {}", id);
        Ok(())
    }

    /// Store a cover image and point the book at it
    pub async fn set_cover(
        &self,
        id: Uuid,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> AppResult<Book> {
        self.get(id).await?;

        let url = self.covers.store(filename, content_type, bytes).await?;

        self.repository
            .books
            .update(
                id,
                UpdateBook {
                    cover_image: Some(url),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AppError::BookNotFound)
    }
}
