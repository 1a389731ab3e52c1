//! API integration tests
//!
//! Run against a live server started with an empty `api.keys` list and
//! `LIBRIS_AUTH__ADMIN_LOGIN=admin` / `LIBRIS_AUTH__ADMIN_PASSWORD=adminadmin`.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Helper to get a token for the given account
async fn get_auth_token(client: &Client, login: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "login": login,
            "password": password
        }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["data"]["token"].as_str().expect("No token in response").to_string()
}

async fn admin_token(client: &Client) -> String {
    get_auth_token(client, "admin", "adminadmin").await
}

/// Register a fresh member and return (user id, token)
async fn new_member(client: &Client) -> (String, String) {
    let login = format!("reader-{}", &Uuid::new_v4().simple().to_string()[..8]);
    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "login": login,
            "password": "reading-is-fun",
            "name": "Test Reader"
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let token = get_auth_token(client, &login, "reading-is-fun").await;
    (id, token)
}

async fn create_book(client: &Client, token: &str, amount: i32) -> String {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "title": format!("Integration title {}", Uuid::new_v4()),
            "amount": amount
        }))
        .send()
        .await
        .expect("Failed to create book");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.unwrap();
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn get_book(client: &Client, token: &str, id: &str) -> Value {
    let response = client
        .get(format!("{}/books/{}", BASE_URL, id))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to get book");
    let body: Value = response.json().await.unwrap();
    body["data"].clone()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["success"]["type"], "HEALTHY");
}

#[tokio::test]
#[ignore]
async fn test_login() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "login": "admin",
            "password": "adminadmin"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["data"]["token"].is_string());
    assert_eq!(body["data"]["tokenType"], "Bearer");
    assert_eq!(body["data"]["user"]["role"], "admin");
    assert!(body["data"]["user"].get("password").is_none());
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "login": "invalid",
            "password": "invalid"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "UNAUTHORIZED");
}

#[tokio::test]
#[ignore]
async fn test_full_borrow_lifecycle() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, member) = new_member(&client).await;
    let book_id = create_book(&client, &admin, 2).await;

    // Request
    let response = client
        .post(format!("{}/borrows", BASE_URL))
        .bearer_auth(&member)
        .json(&json!({ "bookId": book_id, "note": "weekend read" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["borrowStatus"], "pending");
    let borrow_id = body["data"]["id"].as_str().unwrap().to_string();

    // Accept
    let response = client
        .put(format!("{}/borrows/{}", BASE_URL, borrow_id))
        .bearer_auth(&admin)
        .json(&json!({ "borrowStatus": "borrowed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"]["type"], "BORROW_ACCEPTED");
    assert!(body["data"]["dueAt"].is_string());

    let book = get_book(&client, &admin, &book_id).await;
    assert_eq!(book["available"], 1);
    assert_eq!(book["borrows"], 1);
    assert_eq!(book["borrowedTimes"], 1);

    // Deleting while borrowed is refused
    let response = client
        .delete(format!("{}/borrows/{}", BASE_URL, borrow_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "BORROW_IN_PROGRESS");

    // Return
    let response = client
        .put(format!("{}/borrows/{}", BASE_URL, borrow_id))
        .bearer_auth(&admin)
        .json(&json!({ "borrowStatus": "returned" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let book = get_book(&client, &admin, &book_id).await;
    assert_eq!(book["available"], 2);
    assert_eq!(book["borrows"], 0);
    assert_eq!(book["borrowedTimes"], 1);

    // Remove the returned record
    let response = client
        .delete(format!("{}/borrows/{}", BASE_URL, borrow_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore]
async fn test_request_unavailable_book() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, member) = new_member(&client).await;
    let book_id = create_book(&client, &admin, 0).await;

    let response = client
        .post(format!("{}/borrows", BASE_URL))
        .bearer_auth(&member)
        .json(&json!({ "bookId": book_id }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["statusCode"], 409);
    assert_eq!(body["error"]["type"], "BOOK_UNAVAILABLE");
}

#[tokio::test]
#[ignore]
async fn test_unknown_borrow_is_not_found() {
    let client = Client::new();
    let admin = admin_token(&client).await;

    let response = client
        .get(format!("{}/borrows/{}", BASE_URL, Uuid::new_v4()))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "NOT_FOUND");
}

#[tokio::test]
#[ignore]
async fn test_member_sees_only_own_borrows() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (member_id, member) = new_member(&client).await;
    let (_, other) = new_member(&client).await;
    let book_id = create_book(&client, &admin, 3).await;

    for token in [&member, &other] {
        client
            .post(format!("{}/borrows", BASE_URL))
            .bearer_auth(token)
            .json(&json!({ "bookId": book_id }))
            .send()
            .await
            .unwrap();
    }

    let response = client
        .get(format!("{}/borrows?bookId={}", BASE_URL, book_id))
        .bearer_auth(&member)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["userId"], member_id.as_str());
}

#[tokio::test]
#[ignore]
async fn test_amount_cannot_drop_below_lent_copies() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, member) = new_member(&client).await;
    let book_id = create_book(&client, &admin, 1).await;

    let response = client
        .post(format!("{}/borrows", BASE_URL))
        .bearer_auth(&member)
        .json(&json!({ "bookId": book_id }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let borrow_id = body["data"]["id"].as_str().unwrap().to_string();

    client
        .put(format!("{}/borrows/{}", BASE_URL, borrow_id))
        .bearer_auth(&admin)
        .json(&json!({ "borrowStatus": "borrowed" }))
        .send()
        .await
        .unwrap();

    let response = client
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&admin)
        .json(&json!({ "amount": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

async fn request_borrow(client: &Client, token: &str, book_id: &str) -> String {
    let response = client
        .post(format!("{}/borrows", BASE_URL))
        .bearer_auth(token)
        .json(&json!({ "bookId": book_id }))
        .send()
        .await
        .expect("Failed to request borrow");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.unwrap();
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
#[ignore]
async fn test_concurrent_accepts_cannot_overdraw_last_copy() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, first) = new_member(&client).await;
    let (_, second) = new_member(&client).await;
    let book_id = create_book(&client, &admin, 1).await;

    let first_id = request_borrow(&client, &first, &book_id).await;
    let second_id = request_borrow(&client, &second, &book_id).await;

    let accept = |id: String| {
        let client = client.clone();
        let admin = admin.clone();
        async move {
            client
                .put(format!("{}/borrows/{}", BASE_URL, id))
                .bearer_auth(&admin)
                .json(&json!({ "borrowStatus": "borrowed" }))
                .send()
                .await
                .unwrap()
        }
    };

    let (a, b) = tokio::join!(accept(first_id), accept(second_id));

    let mut statuses = vec![a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let rejected = if a.status() == StatusCode::CONFLICT { a } else { b };
    let body: Value = rejected.json().await.unwrap();
    assert_eq!(body["error"]["type"], "BOOK_UNAVAILABLE");

    let book = get_book(&client, &admin, &book_id).await;
    assert_eq!(book["available"], 0);
    assert_eq!(book["borrows"], 1);
    assert_eq!(book["borrowedTimes"], 1);
}

#[tokio::test]
#[ignore]
async fn test_forced_user_delete_returns_lent_copies() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (member_id, member) = new_member(&client).await;
    let book_id = create_book(&client, &admin, 2).await;

    let borrow_id = request_borrow(&client, &member, &book_id).await;
    client
        .put(format!("{}/borrows/{}", BASE_URL, borrow_id))
        .bearer_auth(&admin)
        .json(&json!({ "borrowStatus": "borrowed" }))
        .send()
        .await
        .unwrap();

    let response = client
        .delete(format!("{}/users/{}", BASE_URL, member_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .delete(format!("{}/users/{}?force=true", BASE_URL, member_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let book = get_book(&client, &admin, &book_id).await;
    assert_eq!(book["available"], 2);
    assert_eq!(book["borrows"], 0);
    assert_eq!(book["borrowedTimes"], 1);
}
