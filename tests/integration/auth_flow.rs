//! Registration, login and refresh-token lifecycle

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use libris_server::models::{Role, UserClaims};

use crate::common::{message, test_config, TestApp, JWT_SECRET, PASSWORD};

#[tokio::test]
async fn test_duplicate_email_rejected_case_insensitively() {
    let app = TestApp::new();

    let (status, body) = app.register("ada@example.org").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message(&body), "User registered successfully");
    assert!(body["userId"].is_string());

    let (status, body) = app.register("ada@example.org").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Email already registered");

    let (status, _) = app.register("  ADA@Example.org ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_validates_input() {
    let app = TestApp::new();
    let (status, _) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "not-an-email", "password": "123", "name": "Al" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.register("ada@example.org").await;

    let (wrong_status, wrong_body) = app.login("ada@example.org", "wrong-password").await;
    let (unknown_status, unknown_body) = app.login("nobody@example.org", PASSWORD).await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(message(&wrong_body), "Invalid credentials");
}

#[tokio::test]
async fn test_me_hides_secrets() {
    let app = TestApp::new();
    let session = app.member().await;

    let (status, body) = app.get("/api/auth/me", Some(&session.access_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], session.user_id.as_str());
    assert_eq!(body["role"], "member");
    assert!(body.get("passwordHash").is_none());
    assert!(body.get("refreshTokenHash").is_none());

    let (status, _) = app.get("/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/auth/me", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_reuse_terminates_session() {
    let app = TestApp::new();
    let session = app.member().await;

    let (status, body) = app
        .post(
            "/api/auth/refresh",
            Some(&session.access_token),
            json!({ "refreshToken": session.refresh_token }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["accessToken"].is_string());
    let rotated = body["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, session.refresh_token);

    // Replaying the superseded token is a theft signal
    let (status, body) = app
        .post(
            "/api/auth/refresh",
            Some(&session.access_token),
            json!({ "refreshToken": session.refresh_token }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        message(&body),
        "Invalid refresh token. Session terminated for security."
    );

    // The legitimate, rotated token died with the family
    let (status, body) = app
        .post(
            "/api/auth/refresh",
            Some(&session.access_token),
            json!({ "refreshToken": rotated }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "No refresh token found. Please log in again.");
}

#[tokio::test]
async fn test_refresh_accepts_expired_access_token() {
    let app = TestApp::new();
    let session = app.member().await;

    let now = Utc::now().timestamp();
    let expired = UserClaims {
        sub: Uuid::parse_str(&session.user_id).unwrap(),
        email: "ignored@example.org".into(),
        role: Role::Member,
        iat: now - 7200,
        exp: now - 3600,
    }
    .create_token(JWT_SECRET)
    .unwrap();

    let (status, _) = app.get("/api/auth/me", Some(&expired)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .post(
            "/api/auth/refresh",
            Some(&expired),
            json!({ "refreshToken": session.refresh_token }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let fresh = body["accessToken"].as_str().unwrap();
    let (status, _) = app.get("/api/auth/me", Some(fresh)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rejects_forged_access_token() {
    let app = TestApp::new();
    let session = app.member().await;

    let now = Utc::now().timestamp();
    let forged = UserClaims {
        sub: Uuid::parse_str(&session.user_id).unwrap(),
        email: "x@example.org".into(),
        role: Role::Admin,
        iat: now,
        exp: now + 600,
    }
    .create_token("someone-elses-secret")
    .unwrap();

    let (status, _) = app
        .post(
            "/api/auth/refresh",
            Some(&forged),
            json!({ "refreshToken": session.refresh_token }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_without_rotation_keeps_token_valid() {
    let mut config = test_config();
    config.auth.refresh_token_rotation = false;
    let app = TestApp::with_config(config);
    let session = app.member().await;

    for _ in 0..2 {
        let (status, body) = app
            .post(
                "/api/auth/refresh",
                Some(&session.access_token),
                json!({ "refreshToken": session.refresh_token }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("refreshToken").is_none());
    }
}

#[tokio::test]
async fn test_logout_is_idempotent_and_ends_refresh() {
    let app = TestApp::new();
    let session = app.member().await;

    for _ in 0..2 {
        let (status, body) = app
            .request(Method::POST, "/api/auth/logout", Some(&session.access_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(message(&body), "Logged out successfully");
    }

    let (status, _) = app
        .post(
            "/api/auth/refresh",
            Some(&session.access_token),
            json!({ "refreshToken": session.refresh_token }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_starts_a_new_family() {
    let app = TestApp::new();
    let email = "ada@example.org";
    app.register(email).await;

    let (_, first) = app.login(email, PASSWORD).await;
    let (_, second) = app.login(email, PASSWORD).await;
    let access = second["accessToken"].as_str().unwrap();

    // Only the latest login's refresh token is live
    let (status, _) = app
        .post(
            "/api/auth/refresh",
            Some(access),
            json!({ "refreshToken": second["refreshToken"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            "/api/auth/refresh",
            Some(access),
            json!({ "refreshToken": first["refreshToken"] }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_admin_requires_secret() {
    let app = TestApp::new();
    let payload = json!({
        "email": "boss@example.org",
        "password": "longpassword",
        "name": "The Boss",
    });

    let (status, body) = app
        .post("/api/auth/create-admin", None, payload.clone())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "Invalid or missing admin secret");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/create-admin")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Admin-Secret", "wrong")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = app.admin().await;
    let (status, body) = app.get("/api/auth/me", Some(&admin.access_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
}

#[tokio::test]
async fn test_create_admin_disabled_without_configured_secret() {
    let mut config = test_config();
    config.auth.admin_secret = String::new();
    let app = TestApp::with_config(config);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/create-admin")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Admin-Secret", "")
        .body(Body::from(
            json!({
                "email": "boss@example.org",
                "password": "longpassword",
                "name": "The Boss",
            })
            .to_string(),
        ))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
