//! Media transport seam
//!
//! The coordinator talks to the real-time transport only through these
//! traits. Room events are typed and delivered on a channel that starts
//! buffering the moment `connect` succeeds, so a participant joining while
//! the initial roster is being attached is still seen afterwards.

use async_trait::async_trait;
use quickroom_protocol::{ParticipantData, TrackData, TrackKind};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::media::LocalTrack;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("rejected by server: {0}")]
    Rejected(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("connection closed")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Protocol(e.to_string())
    }
}

/// Options for `Transport::connect`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub name: String,
    /// Whether the transport should capture and publish on its own.
    /// Both stay off: local tracks are published by hand after joining.
    pub audio: bool,
    pub video: bool,
}

impl ConnectOptions {
    pub fn manual_publish(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            audio: false,
            video: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub sid: String,
    pub name: String,
    pub kind: TrackKind,
}

impl From<TrackData> for RemoteTrack {
    fn from(t: TrackData) -> Self {
        Self {
            sid: t.sid,
            name: t.name,
            kind: t.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParticipant {
    pub sid: String,
    pub identity: String,
    pub tracks: Vec<RemoteTrack>,
}

impl From<ParticipantData> for RemoteParticipant {
    fn from(p: ParticipantData) -> Self {
        Self {
            sid: p.sid,
            identity: p.identity,
            tracks: p.tracks.into_iter().map(RemoteTrack::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalParticipant {
    pub sid: String,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackPublication {
    pub track_id: String,
    pub track_sid: String,
}

/// Everything the room reports after joining
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    ParticipantConnected(RemoteParticipant),
    ParticipantDisconnected {
        participant_sid: String,
    },
    TrackAdded {
        participant_sid: String,
        track: RemoteTrack,
    },
    TrackRemoved {
        participant_sid: String,
        track_sid: String,
    },
    TrackSubscriptionFailed {
        participant_sid: String,
        track_sid: String,
        track_name: String,
        error: String,
    },
    Disconnected {
        reason: Option<String>,
    },
}

pub type RoomEvents = mpsc::UnboundedReceiver<RoomEvent>;

/// A joined room
#[async_trait]
pub trait Room: Send + Sync {
    fn sid(&self) -> &str;

    fn name(&self) -> &str;

    fn local_participant(&self) -> &LocalParticipant;

    /// Participants already present when the join completed
    fn participants(&self) -> Vec<RemoteParticipant>;

    async fn publish_track(&self, track: &LocalTrack) -> Result<TrackPublication, TransportError>;

    async fn unpublish_track(&self, track: &LocalTrack) -> Result<(), TransportError>;

    /// Tell the room a local track was enabled or disabled
    async fn track_enabled_changed(&self, _track: &LocalTrack) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self);
}

pub struct ConnectedRoom {
    pub room: Box<dyn Room>,
    pub events: RoomEvents,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, token: &str, options: ConnectOptions) -> Result<ConnectedRoom, TransportError>;
}
