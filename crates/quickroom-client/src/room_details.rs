//! Room details from the launch query string
//!
//! `?roomId=demo&type=peer` selects the room and its kind. Malformed input
//! never fails the caller: it is logged and yields an unnamed group room.

use quickroom_protocol::RoomType;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomDetails {
    pub room_name: String,
    pub room_type: RoomType,
}

impl RoomDetails {
    /// Parse the query part of a full URL (`https://host/?roomId=...`).
    pub fn from_url(url: &str) -> Self {
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or_default();
        let query = query.split('#').next().unwrap_or_default();
        parse_room_details(query)
    }
}

pub fn parse_room_details(query: &str) -> RoomDetails {
    match parse_params(query) {
        Some(params) => RoomDetails {
            room_name: params.get("roomId").cloned().unwrap_or_default(),
            room_type: params
                .get("type")
                .map(|t| RoomType::from_param(t))
                .unwrap_or_default(),
        },
        None => {
            tracing::error!("Incorrect url params: {:?}", query);
            RoomDetails::default()
        }
    }
}

/// Split into decoded key/value pairs; `None` when any pair is malformed.
fn parse_params(query: &str) -> Option<HashMap<String, String>> {
    let query = query.strip_prefix('?').unwrap_or(query);
    if query.is_empty() {
        return None;
    }

    let mut params = HashMap::new();
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=')?;
        let key = urlencoding::decode(key).ok()?;
        let value = urlencoding::decode(value).ok()?;
        // last occurrence wins
        params.insert(key.into_owned(), value.into_owned());
    }
    Some(params)
}
