//! API integration tests.
//!
//! These drive the full router against an in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use blobhub_api::{AppState, router as api_router};
use blobhub_common::{Limits, config::ArchiveConfig};
use blobhub_db::DocumentStore;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Create the test router: 4-byte chunks, 100-byte files, 250 bytes per user.
fn create_test_router() -> Router {
    let limits = Limits {
        chunk_size: 4,
        max_file_bytes: 100,
        max_user_bytes: 250,
    };
    let state = AppState::new(
        DocumentStore::in_memory(),
        limits,
        &ArchiveConfig::default(),
    );
    api_router().with_state(state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Body,
    content_type: Option<&str>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn send_json(app: &Router, method: Method, uri: &str, user: Option<&str>, body: Value) -> Response {
    send(
        app,
        method,
        uri,
        user,
        Body::from(body.to_string()),
        Some("application/json"),
    )
    .await
}

async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Upload `data` through begin, chunk and commit. Returns the blob id.
async fn upload(app: &Router, user: &str, data: &[u8], visibility: &str) -> String {
    let response = send_json(
        app,
        Method::POST,
        "/blobs",
        Some(user),
        json!({
            "fileName": "notes.txt",
            "mimeType": "text/plain",
            "visibility": visibility,
            "sizeBytes": data.len(),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let id = body["data"]["blob"]["id"].as_str().unwrap().to_string();
    let chunk_size = body["data"]["chunkSize"].as_u64().unwrap() as usize;

    for (index, chunk) in data.chunks(chunk_size).enumerate() {
        let response = send(
            app,
            Method::PUT,
            &format!("/blobs/{id}/chunks/{index}"),
            Some(user),
            Body::from(chunk.to_vec()),
            Some("application/octet-stream"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = send(
        app,
        Method::POST,
        &format!("/blobs/{id}/commit"),
        Some(user),
        Body::empty(),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    id
}

#[tokio::test]
async fn test_upload_download_round_trip() {
    let app = create_test_router();
    let data = b"hello, chunked world";

    let id = upload(&app, "alice", data, "private").await;

    let response = send(
        &app,
        Method::GET,
        &format!("/blobs/{id}/content"),
        Some("alice"),
        Body::empty(),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"notes.txt\""
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), data);

    let usage = read_json(send(&app, Method::GET, "/usage", Some("alice"), Body::empty(), None).await).await;
    assert_eq!(usage["data"]["usedBytes"], data.len());
    assert_eq!(usage["data"]["limitBytes"], 250);

    let meta = read_json(
        send(&app, Method::GET, &format!("/blobs/{id}"), Some("alice"), Body::empty(), None).await,
    )
    .await;
    assert_eq!(meta["data"]["views"], 1);
    assert_eq!(meta["data"]["status"], "active");
}

#[tokio::test]
async fn test_mutations_require_identity() {
    let app = create_test_router();

    let response = send_json(
        &app,
        Method::POST,
        "/blobs",
        None,
        json!({ "fileName": "a", "sizeBytes": 1 }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let response = send(&app, Method::GET, "/usage", Some("a/b"), Body::empty(), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_private_blob_hidden_from_others() {
    let app = create_test_router();
    let id = upload(&app, "alice", b"secret", "private").await;

    for user in [None, Some("bob")] {
        let response = send(&app, Method::GET, &format!("/blobs/{id}"), user, Body::empty(), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
    let response = send(&app, Method::POST, &format!("/blobs/{id}/fork"), Some("bob"), Body::empty(), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(response).await["error"]["code"], "PERMISSION_DENIED");
}

#[tokio::test]
async fn test_begin_upload_validation_and_size_cap() {
    let app = create_test_router();

    let response = send_json(
        &app,
        Method::POST,
        "/blobs",
        Some("alice"),
        json!({ "fileName": "", "sizeBytes": 1 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"]["code"], "VALIDATION_ERROR");

    let response = send_json(
        &app,
        Method::POST,
        "/blobs",
        Some("alice"),
        json!({ "fileName": "big.bin", "sizeBytes": 101 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(read_json(response).await["error"]["code"], "TOO_LARGE");
}

#[tokio::test]
async fn test_like_fork_and_lifecycle() {
    let app = create_test_router();
    let id = upload(&app, "alice", b"public bytes", "public").await;

    let liked = read_json(
        send(&app, Method::POST, &format!("/blobs/{id}/like"), Some("bob"), Body::empty(), None).await,
    )
    .await;
    assert_eq!(liked["data"], json!({ "liked": true, "likes": 1 }));

    let fork = read_json(
        send(&app, Method::POST, &format!("/blobs/{id}/fork"), Some("bob"), Body::empty(), None).await,
    )
    .await;
    assert_eq!(fork["data"]["forkedFrom"], id.as_str());
    assert_eq!(fork["data"]["visibility"], "private");
    assert_eq!(fork["data"]["likes"], 0);

    let response = send(&app, Method::POST, &format!("/blobs/{id}/soft-delete"), Some("alice"), Body::empty(), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, Method::GET, &format!("/blobs/{id}/content"), None, Body::empty(), None).await;
    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(read_json(response).await["error"]["code"], "DELETED");

    let response = send(&app, Method::GET, &format!("/blobs/{id}/recover"), Some("alice"), Body::empty(), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), b"public bytes");

    let response = send(&app, Method::DELETE, &format!("/blobs/{id}"), Some("alice"), Body::empty(), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let usage = read_json(send(&app, Method::GET, "/usage", Some("alice"), Body::empty(), None).await).await;
    assert_eq!(usage["data"]["usedBytes"], 0);
}

#[tokio::test]
async fn test_follow_toggle_and_profile() {
    let app = create_test_router();

    let response = send_json(&app, Method::POST, "/following/toggle", Some("alice"), json!({ "userId": "alice" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"]["code"], "SELF_FOLLOW_DENIED");

    let body = read_json(
        send_json(&app, Method::POST, "/following/toggle", Some("alice"), json!({ "userId": "bob" })).await,
    )
    .await;
    assert_eq!(body["data"]["following"], true);

    let followers = read_json(send(&app, Method::GET, "/users/bob/followers", None, Body::empty(), None).await).await;
    assert_eq!(followers["data"][0]["uid"], "alice");

    let response = send_json(
        &app,
        Method::PUT,
        "/i/profile",
        Some("bob"),
        json!({ "displayName": "Bob", "bio": "hi" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let profile = read_json(send(&app, Method::GET, "/profiles/bob", None, Body::empty(), None).await).await;
    assert_eq!(profile["data"]["displayName"], "Bob");
    assert_eq!(profile["data"]["followersCount"], 1);

    let cleared = read_json(send(&app, Method::DELETE, "/i/profile", Some("bob"), Body::empty(), None).await).await;
    assert_eq!(cleared["data"]["bio"], Value::Null);
    assert_eq!(cleared["data"]["followersCount"], 1);
}

#[tokio::test]
async fn test_listings_and_sweep() {
    let app = create_test_router();
    upload(&app, "alice", b"one", "public").await;
    upload(&app, "alice", b"two", "private").await;

    let mine = read_json(send(&app, Method::GET, "/blobs/mine?limit=10", Some("alice"), Body::empty(), None).await).await;
    assert_eq!(mine["data"].as_array().unwrap().len(), 2);

    let feed = read_json(send(&app, Method::GET, "/blobs/feed", None, Body::empty(), None).await).await;
    assert_eq!(feed["data"].as_array().unwrap().len(), 1);

    // Nothing is past the retention window yet.
    let report = read_json(send(&app, Method::POST, "/archive/sweep", Some("alice"), Body::empty(), None).await).await;
    assert_eq!(report["data"]["affected"], 0);
}
