//! Token client against a stub `/createRoom` endpoint
//!
//! Run with: cargo test -p quickroom-client --test token_endpoint

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use quickroom_client::ClientError;
use quickroom_client::network::{TokenClient, TokenProvider};
use quickroom_protocol::RoomType;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn create_room(
    State(seen): State<Seen>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    let room = form.get("roomId").cloned().unwrap_or_default();
    seen.lock().unwrap().push(form);
    Json(json!({ "identity": "alice", "token": format!("token-for-{}", room) }))
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "room service down")
}

async fn start_stub() -> (SocketAddr, Seen) {
    let seen: Seen = Arc::default();
    let router = Router::new()
        .route("/createRoom", post(create_room))
        .route("/broken/createRoom", post(broken))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    (addr, seen)
}

#[tokio::test]
async fn test_request_token_posts_form() {
    let (addr, seen) = start_stub().await;
    let client = TokenClient::new(format!("http://{}/createRoom", addr));

    let grant = client.request_token("demo room", RoomType::Peer).await.unwrap();
    assert_eq!(grant.identity, "alice");
    assert_eq!(grant.token, "token-for-demo room");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].get("roomId").map(String::as_str), Some("demo room"));
    assert_eq!(seen[0].get("type").map(String::as_str), Some("peer"));
}

#[tokio::test]
async fn test_group_is_default_room_type() {
    let (addr, seen) = start_stub().await;
    let client = TokenClient::new(format!("http://{}/createRoom", addr));

    client.request_token("", RoomType::default()).await.unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].get("roomId").map(String::as_str), Some(""));
    assert_eq!(seen[0].get("type").map(String::as_str), Some("group"));
}

#[tokio::test]
async fn test_server_error_is_token_error() {
    let (addr, _) = start_stub().await;
    let client = TokenClient::new(format!("http://{}/broken/createRoom", addr));

    match client.request_token("demo", RoomType::Group).await {
        Err(ClientError::Token(message)) => assert!(message.contains("500"), "{}", message),
        other => panic!("expected token error, got {:?}", other.map(|g| g.identity)),
    }
}

#[tokio::test]
async fn test_unreachable_endpoint_is_token_error() {
    // bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = TokenClient::new(format!("http://{}/createRoom", addr));
    let result = client.request_token("demo", RoomType::Group).await;
    assert!(matches!(result, Err(ClientError::Token(_))));
}
