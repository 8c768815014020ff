mod api;
pub mod websocket;

pub(crate) use api::post_json;
pub use websocket::WsTransport;

use async_trait::async_trait;
use quickroom_protocol::{CreateRoomForm, RoomType, TokenGrant};
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Exchanges a room name for a join token
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn request_token(&self, room_name: &str, room_type: RoomType) -> Result<TokenGrant>;
}

/// `POST <server>/createRoom` token endpoint client
#[derive(Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    create_room_url: String,
}

impl TokenClient {
    pub fn new(create_room_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            create_room_url: create_room_url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.create_room_url
    }
}

#[async_trait]
impl TokenProvider for TokenClient {
    async fn request_token(&self, room_name: &str, room_type: RoomType) -> Result<TokenGrant> {
        let form = CreateRoomForm {
            room_id: room_name.to_string(),
            room_type,
        };

        tracing::debug!("Requesting token for room {:?} ({})", room_name, room_type);
        api::post_form(&self.http, &self.create_room_url, &form)
            .await
            .map_err(|e| ClientError::Token(e.to_string()))
    }
}
