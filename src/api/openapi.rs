//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, health, loans, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "1.0.0",
        description = "Library lending REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::me,
        auth::create_admin,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::upload_cover,
        // Users
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        // Loans
        loans::list_loans,
        loans::get_loan,
        loans::create_loan,
        loans::return_loan,
        loans::get_user_loans,
    ),
    components(
        schemas(
            // Auth
            crate::models::user::RegisterRequest,
            crate::models::user::RegisterResponse,
            crate::models::user::CreateAdminRequest,
            crate::models::user::CreateAdminResponse,
            crate::models::user::LoginRequest,
            crate::models::user::LoginResponse,
            crate::models::user::RefreshRequest,
            crate::models::user::RefreshResponse,
            crate::models::user::UserSummary,
            crate::models::user::MessageResponse,
            // Users
            crate::models::user::User,
            crate::models::user::UpdateUser,
            crate::models::user::Role,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::BookPage,
            crate::models::book::Pagination,
            crate::models::book::CoverResponse,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::CreateLoan,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoanWithBook,
            crate::models::loan::LoanPage,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication and sessions"),
        (name = "books", description = "Book catalog"),
        (name = "users", description = "User management"),
        (name = "loans", description = "Loan management")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by secured paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
