use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of room requested from the token endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    /// Peer-to-peer room
    Peer,
    /// Server-routed group room
    #[default]
    Group,
}

impl RoomType {
    /// Only the literal `peer` selects peer mode; every other value is a group room.
    pub fn from_param(value: &str) -> Self {
        if value == "peer" {
            RoomType::Peer
        } else {
            RoomType::Group
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Peer => "peer",
            RoomType::Group => "group",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form body of `POST /createRoom`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateRoomForm {
    #[serde(rename = "roomId")]
    pub room_id: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
}

/// Response of `POST /createRoom`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenGrant {
    pub identity: String,
    pub token: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => f.write_str("audio"),
            TrackKind::Video => f.write_str("video"),
        }
    }
}

/// A track as announced by the signalling server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackData {
    pub sid: String,
    pub name: String,
    pub kind: TrackKind,
}

/// A participant as announced by the signalling server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantData {
    pub sid: String,
    pub identity: String,
    #[serde(default)]
    pub tracks: Vec<TrackData>,
}

/// Kinds of surface a screen share can capture
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSourceType {
    Window,
    Screen,
    Tab,
}
