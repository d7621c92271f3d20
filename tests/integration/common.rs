//! Shared helpers: an in-memory app driven through the router

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use libris_server::{api, config::AppConfig, repository::Repository, AppState};

pub const ADMIN_SECRET: &str = "integration-admin-secret";
pub const JWT_SECRET: &str = "integration-jwt-secret";
pub const PASSWORD: &str = "password123";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = "memory".to_string();
    config.auth.jwt_secret = JWT_SECRET.to_string();
    config.auth.admin_secret = ADMIN_SECRET.to_string();
    config.auth.bcrypt_cost = 4;
    config.uploads.dir = std::env::temp_dir()
        .join(format!("libris-it-{}", Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();
    config
}

/// Tokens of a signed-in user
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TestApp {
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let state = AppState::new(config, Repository::in_memory());
        Self {
            router: api::create_router(state),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, body).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    pub async fn register(&self, email: &str) -> (StatusCode, Value) {
        self.post(
            "/api/auth/register",
            None,
            json!({ "email": email, "password": PASSWORD, "name": "Test Reader" }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/api/auth/login",
            None,
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Register a fresh member and sign in
    pub async fn member(&self) -> Session {
        let email = format!("member-{}@example.org", Uuid::new_v4());
        let (status, _) = self.register(&email).await;
        assert_eq!(status, StatusCode::CREATED);
        self.sign_in(&email).await
    }

    /// Create a fresh admin and sign in
    pub async fn admin(&self) -> Session {
        let email = format!("admin-{}@example.org", Uuid::new_v4());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/create-admin")
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Admin-Secret", ADMIN_SECRET)
            .body(Body::from(
                json!({ "email": email, "password": PASSWORD, "name": "Head Librarian" }).to_string(),
            ))
            .unwrap();
        let (status, body) = self.send(request).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        self.sign_in(&email).await
    }

    async fn sign_in(&self, email: &str) -> Session {
        let (status, body) = self.login(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        Session {
            user_id: body["user"]["id"].as_str().unwrap().to_string(),
            access_token: body["accessToken"].as_str().unwrap().to_string(),
            refresh_token: body["refreshToken"].as_str().unwrap().to_string(),
        }
    }

    /// Add a book with `total` copies, returning its id
    pub async fn add_book(&self, admin: &Session, title: &str, total: i32) -> String {
        let (status, body) = self
            .post(
                "/api/books",
                Some(&admin.access_token),
                json!({
                    "title": title,
                    "author": "Test Author",
                    "isbn": Uuid::new_v4().to_string(),
                    "totalStock": total,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn available_stock(&self, book_id: &str) -> i64 {
        let (status, body) = self.get(&format!("/api/books/{}", book_id), None).await;
        assert_eq!(status, StatusCode::OK);
        body["availableStock"].as_i64().unwrap()
    }

    /// Borrow `book_id`, optionally with an explicit due date
    pub async fn borrow(
        &self,
        session: &Session,
        book_id: &str,
        due_date: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut body = json!({ "bookId": book_id });
        if let Some(due) = due_date {
            body["dueDate"] = json!(due);
        }
        self.post("/api/loans", Some(&session.access_token), body).await
    }

    pub async fn return_loan(&self, session: &Session, loan_id: &str) -> (StatusCode, Value) {
        self.patch(
            &format!("/api/loans/{}/return", loan_id),
            Some(&session.access_token),
            None,
        )
        .await
    }
}

pub fn message(body: &Value) -> &str {
    body["message"].as_str().unwrap_or_default()
}
