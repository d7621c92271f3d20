//! Book catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::Multipart;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{BookPage, CoverResponse},
        user::MessageResponse,
        Book, BookQuery, CreateBook, UpdateBook,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Search the catalog
#[utoipa::path(
    get,
    path = "/api/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Page of books", body = BookPage)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<BookPage>> {
    let page = state.services.catalog.search(query).await?;
    Ok(Json(page))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/api/books/{id}",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get(id).await?;
    Ok(Json(book))
}

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/api/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input or ISBN already exists"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    claims.require_admin()?;
    book.validate()?;

    let created = state.services.catalog.create(book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a book
#[utoipa::path(
    patch,
    path = "/api/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input or ISBN already exists"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(changes): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    claims.require_admin()?;
    changes.validate()?;

    let updated = state.services.catalog.update(id, changes).await?;
    Ok(Json(updated))
}

/// Delete a book that has no active loans
#[utoipa::path(
    delete,
    path = "/api/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book deleted", body = MessageResponse),
        (status = 400, description = "Book has active loans"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    claims.require_admin()?;

    state.services.catalog.delete(id).await?;
    Ok(Json(MessageResponse::new("Book deleted successfully")))
}

/// Upload a cover image (multipart field `file`)
#[utoipa::path(
    post,
    path = "/api/books/{id}/cover",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "Image in the `file` field"),
    responses(
        (status = 200, description = "Cover stored", body = CoverResponse),
        (status = 400, description = "Missing or invalid file"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn upload_cover(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<CoverResponse>> {
    claims.require_admin()?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("cover").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid upload: {}", e)))?;

        let book = state
            .services
            .catalog
            .set_cover(id, &filename, content_type.as_deref(), &bytes)
            .await?;

        return Ok(Json(CoverResponse {
            cover_url: book.cover_image.unwrap_or_default(),
        }));
    }

    Err(AppError::Validation("No file uploaded".to_string()))
}
