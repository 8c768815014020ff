use serde::{Deserialize, Serialize};

use crate::types::{ParticipantData, TrackData, TrackKind};

/// Messages sent from client to the signalling server via WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room with a token issued by the token endpoint
    Join {
        token: String,
        room: String,
        audio: bool,
        video: bool,
    },

    /// Publish a local track
    PublishTrack {
        track_id: String,
        name: String,
        kind: TrackKind,
    },

    /// Stop publishing a local track
    UnpublishTrack { track_id: String },

    /// Local track was enabled or disabled (mute, camera off)
    SetTrackEnabled { track_id: String, enabled: bool },

    /// Leave the room
    Leave,

    /// Ping to keep connection alive
    Ping,
}

/// Messages sent from the signalling server to the client via WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join accepted; lists everyone already in the room
    Joined {
        room_sid: String,
        room_name: String,
        local: ParticipantData,
        participants: Vec<ParticipantData>,
    },

    /// Error message
    Error { message: String },

    /// Pong response to ping
    Pong,

    /// A local track was published
    TrackPublished { track_id: String, track_sid: String },

    /// A local track could not be published
    TrackPublishFailed { track_id: String, message: String },

    /// A remote participant joined
    ParticipantConnected { participant: ParticipantData },

    /// A remote participant left
    ParticipantDisconnected { participant_sid: String },

    /// A remote participant's track became available
    TrackAdded {
        participant_sid: String,
        track: TrackData,
    },

    /// A remote participant's track went away
    TrackRemoved {
        participant_sid: String,
        track_sid: String,
    },

    /// Subscribing to a remote track failed
    TrackSubscriptionFailed {
        participant_sid: String,
        track_sid: String,
        track_name: String,
        message: String,
    },

    /// The server ended the session
    Disconnected { reason: Option<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_wire_format() {
        let json = serde_json::to_value(ClientMessage::Join {
            token: "tok".into(),
            room: "demo".into(),
            audio: false,
            video: false,
        })
        .unwrap();
        assert_eq!(json["type"], "join");
        assert_eq!(json["room"], "demo");
        assert_eq!(json["audio"], false);
    }

    #[test]
    fn test_track_added_from_server() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"type":"track_added","participant_sid":"PA1",
                "track":{"sid":"MT1","name":"camera","kind":"video"}}"#,
        )
        .unwrap();
        match msg {
            ServerMessage::TrackAdded { participant_sid, track } => {
                assert_eq!(participant_sid, "PA1");
                assert_eq!(track.kind, TrackKind::Video);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
