//! Test doubles for the transport, token endpoint and capture bridges

use async_trait::async_trait;
use quickroom_protocol::{ExtensionRequest, RoomType, TokenGrant, TrackKind};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::diagnostics::{Report, Reporter};
use crate::error::{ClientError, Result};
use crate::media::{CaptureSource, ExtensionMessenger, LocalTrack, ScreenShareError, SourcePicker};
use crate::network::TokenProvider;
use crate::transport::{
    ConnectOptions, ConnectedRoom, LocalParticipant, RemoteParticipant, RemoteTrack, Room, RoomEvent,
    Transport, TrackPublication, TransportError,
};

pub fn participant(sid: &str, identity: &str, tracks: &[(&str, TrackKind)]) -> RemoteParticipant {
    RemoteParticipant {
        sid: sid.to_string(),
        identity: identity.to_string(),
        tracks: tracks
            .iter()
            .map(|(track_sid, kind)| RemoteTrack {
                sid: track_sid.to_string(),
                name: format!("{}-{}", identity, kind),
                kind: *kind,
            })
            .collect(),
    }
}

/// What the fake room saw
#[derive(Debug, Default)]
pub struct RoomLog {
    pub connects: Vec<(String, ConnectOptions)>,
    pub published: Vec<String>,
    pub unpublished: Vec<String>,
    pub enabled_changes: Vec<(String, bool)>,
    pub disconnects: usize,
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    pub participants: Vec<RemoteParticipant>,
    pub reject_connect: bool,
    /// Track names whose publication fails
    pub failing_publishes: Vec<String>,
    pub failing_unpublish: bool,
    pub log: Arc<Mutex<RoomLog>>,
    events: Arc<Mutex<Option<mpsc::UnboundedSender<RoomEvent>>>>,
}

impl FakeTransport {
    pub fn with_participants(participants: Vec<RemoteParticipant>) -> Self {
        Self {
            participants,
            ..Self::default()
        }
    }

    /// Every connect attempt is refused
    pub fn rejecting() -> Self {
        Self {
            reject_connect: true,
            ..Self::default()
        }
    }

    /// Publishing the track named `name` fails
    pub fn failing_publish(name: &str) -> Self {
        Self {
            failing_publishes: vec![name.to_string()],
            ..Self::default()
        }
    }

    /// Every unpublish fails
    pub fn failing_unpublish() -> Self {
        Self {
            failing_unpublish: true,
            ..Self::default()
        }
    }

    /// Push an event as if the server sent it
    pub fn emit(&self, event: RoomEvent) {
        let events = self.events.lock().unwrap();
        events
            .as_ref()
            .expect("not connected")
            .send(event)
            .expect("event receiver dropped");
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, RoomLog> {
        self.log.lock().unwrap()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self, token: &str, options: ConnectOptions) -> std::result::Result<ConnectedRoom, TransportError> {
        self.log.lock().unwrap().connects.push((token.to_string(), options.clone()));
        if self.reject_connect {
            return Err(TransportError::Rejected("invalid token".to_string()));
        }

        let (tx, events) = mpsc::unbounded_channel();
        *self.events.lock().unwrap() = Some(tx);

        Ok(ConnectedRoom {
            room: Box::new(FakeRoom {
                name: options.name,
                local: LocalParticipant {
                    sid: "PA-local".to_string(),
                    identity: token.trim_start_matches("token-").to_string(),
                },
                transport: self.clone(),
            }),
            events,
        })
    }
}

struct FakeRoom {
    name: String,
    local: LocalParticipant,
    transport: FakeTransport,
}

#[async_trait]
impl Room for FakeRoom {
    fn sid(&self) -> &str {
        "RM-fake"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn local_participant(&self) -> &LocalParticipant {
        &self.local
    }

    fn participants(&self) -> Vec<RemoteParticipant> {
        self.transport.participants.clone()
    }

    async fn publish_track(&self, track: &LocalTrack) -> std::result::Result<TrackPublication, TransportError> {
        if self.transport.failing_publishes.iter().any(|n| n == track.name()) {
            return Err(TransportError::Publish(format!("{} refused", track.name())));
        }
        self.transport.log().published.push(track.id().to_string());
        Ok(TrackPublication {
            track_id: track.id().to_string(),
            track_sid: format!("MT-{}", track.id()),
        })
    }

    async fn unpublish_track(&self, track: &LocalTrack) -> std::result::Result<(), TransportError> {
        if self.transport.failing_unpublish {
            return Err(TransportError::Closed);
        }
        self.transport.log().unpublished.push(track.id().to_string());
        Ok(())
    }

    async fn track_enabled_changed(&self, track: &LocalTrack) -> std::result::Result<(), TransportError> {
        self.transport
            .log()
            .enabled_changes
            .push((track.id().to_string(), track.is_enabled()));
        Ok(())
    }

    async fn disconnect(&self) {
        self.transport.log().disconnects += 1;
    }
}

pub struct FakeTokens {
    pub fail: bool,
    pub requests: Mutex<Vec<(String, RoomType)>>,
}

impl FakeTokens {
    pub fn ok() -> Self {
        Self {
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TokenProvider for FakeTokens {
    async fn request_token(&self, room_name: &str, room_type: RoomType) -> Result<TokenGrant> {
        self.requests.lock().unwrap().push((room_name.to_string(), room_type));
        if self.fail {
            return Err(ClientError::Token("503 Service Unavailable".to_string()));
        }
        Ok(TokenGrant {
            identity: "alice".to_string(),
            token: "token-alice".to_string(),
        })
    }
}

/// Extension that always answers with the same JSON
pub struct ScriptedMessenger {
    reply: serde_json::Value,
    installed: bool,
}

impl ScriptedMessenger {
    pub fn replying(reply: serde_json::Value) -> Self {
        Self {
            reply,
            installed: true,
        }
    }

    pub fn not_installed() -> Self {
        Self {
            reply: serde_json::Value::Null,
            installed: false,
        }
    }
}

#[async_trait]
impl ExtensionMessenger for ScriptedMessenger {
    async fn is_installed(&self, _extension_id: &str) -> bool {
        self.installed
    }

    async fn send_message(
        &self,
        _extension_id: &str,
        _request: &ExtensionRequest,
    ) -> std::result::Result<serde_json::Value, ScreenShareError> {
        Ok(self.reply.clone())
    }
}

/// Picker that always makes the same choice
pub struct FixedPicker(pub Option<String>);

#[async_trait]
impl SourcePicker for FixedPicker {
    async fn pick(&self, sources: Vec<CaptureSource>) -> Option<String> {
        self.0.clone().filter(|id| sources.iter().any(|s| &s.id == id))
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reporter for RecordingReporter {
    async fn send(&self, report: &Report) -> Result<()> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}
