//! WebSocket signalling transport
//!
//! Joins a room over a JSON WebSocket protocol and turns server pushes into
//! typed `RoomEvent`s. Publishing waits for the server's acknowledgement.

use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use quickroom_protocol::{ClientMessage, ServerMessage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};

use crate::media::LocalTrack;
use crate::transport::{
    ConnectOptions, ConnectedRoom, LocalParticipant, RemoteParticipant, Room, RoomEvent, Transport,
    TrackPublication, TransportError,
};

type PendingPublishes = Arc<Mutex<HashMap<String, oneshot::Sender<Result<String, String>>>>>;

pub struct WsTransport {
    url: String,
    request_timeout: Duration,
    ping_interval: Duration,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(30),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, token: &str, options: ConnectOptions) -> Result<ConnectedRoom, TransportError> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        let join = ClientMessage::Join {
            token: token.to_string(),
            room: options.name.clone(),
            audio: options.audio,
            video: options.video,
        };
        let json = serde_json::to_string(&join)?;
        write
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let joined = tokio::time::timeout(self.request_timeout, await_joined(&mut read))
            .await
            .map_err(|_| TransportError::Timeout("join"))??;

        let ServerMessage::Joined {
            room_sid,
            room_name,
            local,
            participants,
        } = joined
        else {
            return Err(TransportError::Protocol("expected joined".to_string()));
        };

        tracing::info!("Signalling joined room {} ({})", room_name, room_sid);

        // Outgoing messages
        let (tx, mut rx) = mpsc::channel::<ClientMessage>(100);
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(j) => j,
                    Err(e) => {
                        tracing::error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };

                if write.send(Message::Text(json.into())).await.is_err() {
                    tracing::error!("Failed to send WebSocket message");
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Incoming messages
        let (event_tx, events) = mpsc::unbounded_channel();
        let pending: PendingPublishes = Arc::new(Mutex::new(HashMap::new()));
        let pending_reader = pending.clone();
        tokio::spawn(async move {
            let mut disconnected = false;
            while let Some(result) = read.next().await {
                match result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(msg) => {
                            disconnected |= matches!(msg, ServerMessage::Disconnected { .. });
                            handle_message(&event_tx, &pending_reader, msg);
                        }
                        Err(e) => tracing::warn!("Unparseable signalling message: {}", e),
                    },
                    Ok(Message::Close(_)) => {
                        tracing::info!("WebSocket closed by server");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            // Anyone still waiting for a publish ack gets nothing
            if let Ok(mut pending) = pending_reader.lock() {
                pending.clear();
            }
            if !disconnected {
                let _ = event_tx.send(RoomEvent::Disconnected {
                    reason: Some("connection closed".to_string()),
                });
            }
        });

        // Keepalive; stops once the room (and its sender) is gone
        let weak_tx = tx.downgrade();
        let ping_interval = self.ping_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ping_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(tx) = weak_tx.upgrade() else { break };
                if tx.send(ClientMessage::Ping).await.is_err() {
                    break;
                }
            }
        });

        let room = WsRoom {
            sid: room_sid,
            name: room_name,
            local: LocalParticipant {
                sid: local.sid,
                identity: local.identity,
            },
            participants: participants.into_iter().map(RemoteParticipant::from).collect(),
            sender: tx,
            pending,
            request_timeout: self.request_timeout,
        };

        Ok(ConnectedRoom {
            room: Box::new(room),
            events,
        })
    }
}

/// Read until the server accepts or rejects the join
async fn await_joined<S>(read: &mut S) -> Result<ServerMessage, TransportError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(result) = read.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text)? {
                joined @ ServerMessage::Joined { .. } => return Ok(joined),
                ServerMessage::Error { message } => return Err(TransportError::Rejected(message)),
                other => tracing::debug!("Ignoring {:?} before join completed", other),
            },
            Ok(Message::Close(_)) => return Err(TransportError::Closed),
            Ok(_) => {}
            Err(e) => return Err(TransportError::Connection(e.to_string())),
        }
    }
    Err(TransportError::Closed)
}

fn handle_message(events: &mpsc::UnboundedSender<RoomEvent>, pending: &PendingPublishes, message: ServerMessage) {
    let event = match message {
        ServerMessage::ParticipantConnected { participant } => {
            RoomEvent::ParticipantConnected(participant.into())
        }
        ServerMessage::ParticipantDisconnected { participant_sid } => {
            RoomEvent::ParticipantDisconnected { participant_sid }
        }
        ServerMessage::TrackAdded { participant_sid, track } => RoomEvent::TrackAdded {
            participant_sid,
            track: track.into(),
        },
        ServerMessage::TrackRemoved {
            participant_sid,
            track_sid,
        } => RoomEvent::TrackRemoved {
            participant_sid,
            track_sid,
        },
        ServerMessage::TrackSubscriptionFailed {
            participant_sid,
            track_sid,
            track_name,
            message,
        } => RoomEvent::TrackSubscriptionFailed {
            participant_sid,
            track_sid,
            track_name,
            error: message,
        },
        ServerMessage::Disconnected { reason } => RoomEvent::Disconnected { reason },
        ServerMessage::TrackPublished { track_id, track_sid } => {
            resolve_publish(pending, &track_id, Ok(track_sid));
            return;
        }
        ServerMessage::TrackPublishFailed { track_id, message } => {
            resolve_publish(pending, &track_id, Err(message));
            return;
        }
        ServerMessage::Error { message } => {
            tracing::error!("Server error: {}", message);
            return;
        }
        ServerMessage::Pong => return,
        ServerMessage::Joined { room_name, .. } => {
            tracing::warn!("Unexpected second join for room {}", room_name);
            return;
        }
    };

    if events.send(event).is_err() {
        tracing::debug!("Room event dropped; session already gone");
    }
}

fn resolve_publish(pending: &PendingPublishes, track_id: &str, result: Result<String, String>) {
    let waiter = pending.lock().ok().and_then(|mut p| p.remove(track_id));
    match waiter {
        Some(waiter) => {
            let _ = waiter.send(result);
        }
        None => tracing::debug!("Publish result for unknown track {}", track_id),
    }
}

struct WsRoom {
    sid: String,
    name: String,
    local: LocalParticipant,
    participants: Vec<RemoteParticipant>,
    sender: mpsc::Sender<ClientMessage>,
    pending: PendingPublishes,
    request_timeout: Duration,
}

impl WsRoom {
    async fn send(&self, message: ClientMessage) -> Result<(), TransportError> {
        self.sender.send(message).await.map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl Room for WsRoom {
    fn sid(&self) -> &str {
        &self.sid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn local_participant(&self) -> &LocalParticipant {
        &self.local
    }

    fn participants(&self) -> Vec<RemoteParticipant> {
        self.participants.clone()
    }

    async fn publish_track(&self, track: &LocalTrack) -> Result<TrackPublication, TransportError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| TransportError::Publish("publish state poisoned".to_string()))?
            .insert(track.id().to_string(), ack_tx);

        self.send(ClientMessage::PublishTrack {
            track_id: track.id().to_string(),
            name: track.name().to_string(),
            kind: track.kind(),
        })
        .await?;

        let result = tokio::time::timeout(self.request_timeout, ack_rx).await;
        match result {
            Ok(Ok(Ok(track_sid))) => Ok(TrackPublication {
                track_id: track.id().to_string(),
                track_sid,
            }),
            Ok(Ok(Err(message))) => Err(TransportError::Publish(message)),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                if let Ok(mut pending) = self.pending.lock() {
                    pending.remove(track.id());
                }
                Err(TransportError::Timeout("track publication"))
            }
        }
    }

    async fn unpublish_track(&self, track: &LocalTrack) -> Result<(), TransportError> {
        self.send(ClientMessage::UnpublishTrack {
            track_id: track.id().to_string(),
        })
        .await
    }

    async fn track_enabled_changed(&self, track: &LocalTrack) -> Result<(), TransportError> {
        self.send(ClientMessage::SetTrackEnabled {
            track_id: track.id().to_string(),
            enabled: track.is_enabled(),
        })
        .await
    }

    async fn disconnect(&self) {
        if self.send(ClientMessage::Leave).await.is_err() {
            tracing::debug!("Signalling already closed while leaving");
        }
    }
}
