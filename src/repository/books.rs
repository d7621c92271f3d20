//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{book::STOCK_OUT_OF_RANGE, Book, BookQuery, UpdateBook},
};

use super::{is_unique_violation, BooksStore};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Substring pattern for `LIKE ... ESCAPE '\'`, with wildcards in the
/// user's text matched literally
fn contains_pattern(search: &str) -> String {
    let escaped = search
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn map_isbn_conflict(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e, "books_isbn_key") {
        AppError::DuplicateIsbn
    } else {
        AppError::Database(e)
    }
}

#[async_trait]
impl BooksStore for BooksRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(book)
    }

    async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE isbn = $1")
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?;

        Ok(book)
    }

    async fn find_many(&self, ids: Vec<Uuid>) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(books)
    }

    async fn search(&self, query: BookQuery, offset: i64, limit: i64) -> AppResult<(Vec<Book>, i64)> {
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(ref search) = query.search {
            params.push(contains_pattern(search));
            let n = params.len();
            let like = |column: &str| format!("{} LIKE ${} ESCAPE '\\'", column, n);
            conditions.push(format!(
                "({} OR {} OR {} OR {})",
                like("LOWER(title)"),
                like("LOWER(author)"),
                like("LOWER(isbn)"),
                like("LOWER(COALESCE(description, ''))"),
            ));
        }

        if let Some(ref category) = query.category {
            params.push(category.clone());
            conditions.push(format!("category = ${}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM books {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM books {} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            where_clause, limit, offset
        );
        let mut select_builder = sqlx::query_as::<_, Book>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let books = select_builder.fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    async fn insert(&self, book: Book) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                id, title, author, isbn, publisher, published_year, category,
                description, cover_image, total_stock, available_stock, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.publisher)
        .bind(book.published_year)
        .bind(&book.category)
        .bind(&book.description)
        .bind(&book.cover_image)
        .bind(book.total_stock)
        .bind(book.available_stock)
        .bind(book.created_at)
        .bind(book.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_isbn_conflict)
    }

    async fn update(&self, id: Uuid, changes: UpdateBook) -> AppResult<Option<Book>> {
        // The stock guard is evaluated against the row as locked by the
        // update, so a concurrent loan or return cannot slip in between.
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                isbn = COALESCE($4, isbn),
                publisher = COALESCE($5, publisher),
                published_year = COALESCE($6, published_year),
                category = COALESCE($7, category),
                description = COALESCE($8, description),
                cover_image = COALESCE($9, cover_image),
                total_stock = COALESCE($10, total_stock),
                available_stock = COALESCE($11, available_stock),
                updated_at = NOW()
            WHERE id = $1
              AND COALESCE($11, available_stock) BETWEEN 0 AND COALESCE($10, total_stock)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.author)
        .bind(&changes.isbn)
        .bind(&changes.publisher)
        .bind(changes.published_year)
        .bind(&changes.category)
        .bind(&changes.description)
        .bind(&changes.cover_image)
        .bind(changes.total_stock)
        .bind(changes.available_stock)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_isbn_conflict)?;

        if updated.is_some() {
            return Ok(updated);
        }

        // No row: either the book is gone or the stock guard refused
        match self.find_by_id(id).await? {
            Some(_) => Err(AppError::Validation(STOCK_OUT_OF_RANGE.to_string())),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Loan issue updates the same row, so holding its lock keeps new
        // loans out until the delete commits.
        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM books WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Ok(false);
        }

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND status = 'active'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if active > 0 {
            return Err(AppError::ActiveLoansPreventDeletion);
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(true)
    }
}
