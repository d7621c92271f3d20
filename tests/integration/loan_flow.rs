//! Borrowing and returning books

use axum::http::StatusCode;
use chrono::{Duration, Utc};

use crate::common::{message, TestApp};

fn days_from_now(days: i64) -> String {
    (Utc::now() + Duration::days(days)).to_rfc3339()
}

#[tokio::test]
async fn test_last_copy_scenario_with_late_return() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let alice = app.member().await;
    let bob = app.member().await;
    let book = app.add_book(&admin, "Dune", 1).await;

    // Borrowed 34 days ago on a 14-day loan: due 20 days ago
    let (status, loan) = app.borrow(&alice, &book, Some(&days_from_now(-20))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", loan);
    assert_eq!(loan["status"], "active");
    assert!(loan["returnDate"].is_null());
    assert_eq!(app.available_stock(&book).await, 0);

    let (status, body) = app.borrow(&bob, &book, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Book is not available for loan");

    let loan_id = loan["id"].as_str().unwrap();
    let (status, returned) = app.return_loan(&alice, loan_id).await;
    assert_eq!(status, StatusCode::OK, "{}", returned);
    assert_eq!(returned["status"], "returned_late");
    assert!(returned["returnDate"].is_string());
    assert_eq!(app.available_stock(&book).await, 1);
}

#[tokio::test]
async fn test_on_time_return_and_default_due_date() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let alice = app.member().await;
    let book = app.add_book(&admin, "Dune", 3).await;

    let (status, loan) = app.borrow(&alice, &book, None).await;
    assert_eq!(status, StatusCode::CREATED);

    let borrowed = chrono::DateTime::parse_from_rfc3339(loan["borrowDate"].as_str().unwrap()).unwrap();
    let due = chrono::DateTime::parse_from_rfc3339(loan["dueDate"].as_str().unwrap()).unwrap();
    assert_eq!(due - borrowed, Duration::days(14));

    let (status, returned) = app.return_loan(&alice, loan["id"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "returned");
}

#[tokio::test]
async fn test_second_return_fails_without_double_increment() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let alice = app.member().await;
    let book = app.add_book(&admin, "Dune", 2).await;

    let (_, loan) = app.borrow(&alice, &book, None).await;
    let loan_id = loan["id"].as_str().unwrap();
    assert_eq!(app.available_stock(&book).await, 1);

    let (status, _) = app.return_loan(&alice, loan_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.available_stock(&book).await, 2);

    let (status, body) = app.return_loan(&alice, loan_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Loan is not active");
    assert_eq!(app.available_stock(&book).await, 2);
}

#[tokio::test]
async fn test_one_active_loan_per_book() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let alice = app.member().await;
    let book = app.add_book(&admin, "Dune", 5).await;

    let (status, loan) = app.borrow(&alice, &book, None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.borrow(&alice, &book, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "You already have an active loan for this book");
    assert_eq!(app.available_stock(&book).await, 4);

    // Borrowing again is fine once returned
    app.return_loan(&alice, loan["id"].as_str().unwrap()).await;
    let (status, _) = app.borrow(&alice, &book, None).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_overdue_loan_blocks_new_borrowing() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let alice = app.member().await;
    let late_book = app.add_book(&admin, "Dune", 1).await;
    let other_book = app.add_book(&admin, "Emma", 10).await;

    let (status, _) = app.borrow(&alice, &late_book, Some(&days_from_now(-1))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.borrow(&alice, &other_book, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "You have overdue loans. Please return them first.");
    assert_eq!(app.available_stock(&other_book).await, 10);
}

#[tokio::test]
async fn test_unknown_book_and_loan() {
    let app = TestApp::new();
    let alice = app.member().await;
    let missing = uuid::Uuid::new_v4().to_string();

    let (status, body) = app.borrow(&alice, &missing, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(message(&body), "Book not found");

    let (status, body) = app.return_loan(&alice, &missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(message(&body), "Loan not found");
}

#[tokio::test]
async fn test_book_deletion_blocked_by_active_loan() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let alice = app.member().await;
    let idle = app.add_book(&admin, "Emma", 1).await;
    let borrowed = app.add_book(&admin, "Dune", 1).await;

    let (status, body) = app
        .delete(&format!("/api/books/{}", idle), Some(&admin.access_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message(&body), "Book deleted successfully");

    let (_, loan) = app.borrow(&alice, &borrowed, None).await;
    let (status, body) = app
        .delete(&format!("/api/books/{}", borrowed), Some(&admin.access_token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Cannot delete book with active loans");

    app.return_loan(&alice, loan["id"].as_str().unwrap()).await;
    let (status, _) = app
        .delete(&format!("/api/books/{}", borrowed), Some(&admin.access_token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/books/{}", borrowed), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_loan_visibility() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let alice = app.member().await;
    let bob = app.member().await;
    let book = app.add_book(&admin, "Dune", 5).await;

    let (_, alice_loan) = app.borrow(&alice, &book, None).await;
    app.borrow(&bob, &book, None).await;
    let alice_loan_id = alice_loan["id"].as_str().unwrap();

    // Members only see their own loans
    let (status, body) = app.get("/api/loans", Some(&alice.access_token)).await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["userId"], alice.user_id.as_str());
    assert_eq!(data[0]["book"]["title"], "Dune");
    assert!(data[0]["user"].get("passwordHash").is_none());

    let (_, body) = app.get("/api/loans", Some(&admin.access_token)).await;
    assert_eq!(body["pagination"]["total"], 2);

    let (_, body) = app
        .get("/api/loans?status=returned", Some(&admin.access_token))
        .await;
    assert_eq!(body["pagination"]["total"], 0);

    let uri = format!("/api/loans/{}", alice_loan_id);
    let (status, body) = app.get(&uri, Some(&alice.access_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["title"], "Dune");

    let (status, _) = app.get(&uri, Some(&bob.access_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.return_loan(&bob, alice_loan_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let user_uri = format!("/api/loans/user/{}", alice.user_id);
    let (status, body) = app.get(&user_uri, Some(&alice.access_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = app.get(&user_uri, Some(&bob.access_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get(&user_uri, Some(&admin.access_token)).await;
    assert_eq!(status, StatusCode::OK);

    // Admins may close anyone's loan
    let (status, _) = app.return_loan(&admin, alice_loan_id).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_borrowers_never_overdraw_stock() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let book = app.add_book(&admin, "Dune", 3).await;

    let mut members = Vec::new();
    for _ in 0..8 {
        members.push(app.member().await);
    }

    let handles: Vec<_> = members
        .into_iter()
        .map(|member| {
            let app = app.clone();
            let book = book.clone();
            tokio::spawn(async move { app.borrow(&member, &book, None).await.0 })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap() == StatusCode::CREATED {
            created += 1;
        }
    }

    assert_eq!(created, 3);
    assert_eq!(app.available_stock(&book).await, 0);
}
