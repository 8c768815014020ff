//! WebSocket transport against a scripted signalling server
//!
//! Run with: cargo test -p quickroom-client --test signalling

use futures_util::{SinkExt, StreamExt};
use quickroom_client::media::{LocalTrack, TrackSource};
use quickroom_client::network::WsTransport;
use quickroom_client::transport::{ConnectOptions, RoomEvent, Transport, TransportError};
use quickroom_protocol::{ClientMessage, ParticipantData, ServerMessage, TrackData, TrackKind};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

type ServerStream = WebSocketStream<tokio::net::TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

async fn send(ws: &mut ServerStream, message: ServerMessage) {
    let json = serde_json::to_string(&message).unwrap();
    ws.send(Message::Text(json.into())).await.unwrap();
}

/// Next client message, skipping keepalives
async fn recv(ws: &mut ServerStream) -> Option<ClientMessage> {
    while let Some(frame) = ws.next().await {
        match frame.ok()? {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text).unwrap() {
                ClientMessage::Ping => continue,
                message => return Some(message),
            },
            Message::Close(_) => return None,
            _ => continue,
        }
    }
    None
}

fn joined(room: &str) -> ServerMessage {
    ServerMessage::Joined {
        room_sid: "RM1".to_string(),
        room_name: room.to_string(),
        local: ParticipantData {
            sid: "PA-local".to_string(),
            identity: "alice".to_string(),
            tracks: vec![],
        },
        participants: vec![ParticipantData {
            sid: "PA-bob".to_string(),
            identity: "bob".to_string(),
            tracks: vec![TrackData {
                sid: "MT-bob-cam".to_string(),
                name: "camera".to_string(),
                kind: TrackKind::Video,
            }],
        }],
    }
}

/// Accept one connection and hand it to `script`
async fn start_server<F, Fut>(script: F) -> (String, tokio::task::JoinHandle<Vec<ClientMessage>>)
where
    F: FnOnce(ServerStream) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Vec<ClientMessage>> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        script(ws).await
    });
    (url, handle)
}

#[tokio::test]
async fn test_join_publish_events_and_leave() {
    let (url, server) = start_server(|mut ws| async move {
        let mut seen = Vec::new();

        let join = recv(&mut ws).await.unwrap();
        let room = match &join {
            ClientMessage::Join { room, .. } => room.clone(),
            other => panic!("expected join, got {:?}", other),
        };
        seen.push(join);
        send(&mut ws, joined(&room)).await;

        let publish = recv(&mut ws).await.unwrap();
        if let ClientMessage::PublishTrack { track_id, .. } = &publish {
            send(
                &mut ws,
                ServerMessage::TrackPublished {
                    track_id: track_id.clone(),
                    track_sid: format!("MT-{}", track_id),
                },
            )
            .await;
        }
        seen.push(publish);

        send(
            &mut ws,
            ServerMessage::ParticipantConnected {
                participant: ParticipantData {
                    sid: "PA-carol".to_string(),
                    identity: "carol".to_string(),
                    tracks: vec![],
                },
            },
        )
        .await;
        send(
            &mut ws,
            ServerMessage::TrackSubscriptionFailed {
                participant_sid: "PA-carol".to_string(),
                track_sid: "MT-carol-screen".to_string(),
                track_name: "screen".to_string(),
                message: "codec unsupported".to_string(),
            },
        )
        .await;

        // mute, then leave
        while let Some(message) = recv(&mut ws).await {
            let leaving = matches!(message, ClientMessage::Leave);
            seen.push(message);
            if leaving {
                break;
            }
        }
        let _ = ws.close(None).await;
        seen
    })
    .await;

    let transport = WsTransport::new(url);
    let connected = timeout(WAIT, transport.connect("token-alice", ConnectOptions::manual_publish("demo")))
        .await
        .unwrap()
        .unwrap();
    let room = connected.room;
    let mut events = connected.events;

    assert_eq!(room.name(), "demo");
    assert_eq!(room.sid(), "RM1");
    assert_eq!(room.local_participant().identity, "alice");
    let present = room.participants();
    assert_eq!(present.len(), 1);
    assert_eq!(present[0].identity, "bob");
    assert_eq!(present[0].tracks[0].sid, "MT-bob-cam");

    let mic = LocalTrack::new("mic-1", "Microphone", TrackKind::Audio, TrackSource::Microphone);
    let publication = timeout(WAIT, room.publish_track(&mic)).await.unwrap().unwrap();
    assert_eq!(publication.track_sid, "MT-mic-1");

    match timeout(WAIT, events.recv()).await.unwrap() {
        Some(RoomEvent::ParticipantConnected(participant)) => assert_eq!(participant.identity, "carol"),
        other => panic!("expected participant, got {:?}", other),
    }
    match timeout(WAIT, events.recv()).await.unwrap() {
        Some(RoomEvent::TrackSubscriptionFailed { track_name, error, .. }) => {
            assert_eq!(track_name, "screen");
            assert_eq!(error, "codec unsupported");
        }
        other => panic!("expected subscription failure, got {:?}", other),
    }

    mic.disable();
    room.track_enabled_changed(&mic).await.unwrap();
    room.disconnect().await;

    // server closes after Leave; the reader reports it once
    match timeout(WAIT, events.recv()).await.unwrap() {
        Some(RoomEvent::Disconnected { .. }) => {}
        other => panic!("expected disconnect, got {:?}", other),
    }

    let seen = timeout(WAIT, server).await.unwrap().unwrap();
    assert!(matches!(
        &seen[0],
        ClientMessage::Join { token, room, audio: false, video: false } if token == "token-alice" && room == "demo"
    ));
    assert!(matches!(&seen[1], ClientMessage::PublishTrack { track_id, kind: TrackKind::Audio, .. } if track_id == "mic-1"));
    assert!(matches!(&seen[2], ClientMessage::SetTrackEnabled { track_id, enabled: false } if track_id == "mic-1"));
    assert!(matches!(seen[3], ClientMessage::Leave));
}

#[tokio::test]
async fn test_rejected_join() {
    let (url, _server) = start_server(|mut ws| async move {
        let join = recv(&mut ws).await.unwrap();
        send(
            &mut ws,
            ServerMessage::Error {
                message: "invalid token".to_string(),
            },
        )
        .await;
        vec![join]
    })
    .await;

    let result = WsTransport::new(url)
        .connect("bogus", ConnectOptions::manual_publish("demo"))
        .await;
    match result {
        Err(TransportError::Rejected(message)) => assert_eq!(message, "invalid token"),
        Err(other) => panic!("expected rejection, got {}", other),
        Ok(_) => panic!("join should have been rejected"),
    }
}

#[tokio::test]
async fn test_publish_refused_by_server() {
    let (url, _server) = start_server(|mut ws| async move {
        let join = recv(&mut ws).await.unwrap();
        send(&mut ws, joined("demo")).await;
        if let Some(ClientMessage::PublishTrack { track_id, .. }) = recv(&mut ws).await {
            send(
                &mut ws,
                ServerMessage::TrackPublishFailed {
                    track_id,
                    message: "quota exceeded".to_string(),
                },
            )
            .await;
        }
        // hold the connection open until the client goes away
        while recv(&mut ws).await.is_some() {}
        vec![join]
    })
    .await;

    let connected = WsTransport::new(url)
        .connect("token-alice", ConnectOptions::manual_publish("demo"))
        .await
        .unwrap();
    let camera = LocalTrack::new("cam-1", "Camera", TrackKind::Video, TrackSource::Camera);
    let result = timeout(WAIT, connected.room.publish_track(&camera)).await.unwrap();
    assert!(matches!(result, Err(TransportError::Publish(message)) if message == "quota exceeded"));
}

#[tokio::test]
async fn test_server_push_disconnect() {
    let (url, _server) = start_server(|mut ws| async move {
        let join = recv(&mut ws).await.unwrap();
        send(&mut ws, joined("demo")).await;
        send(
            &mut ws,
            ServerMessage::Disconnected {
                reason: Some("room closed".to_string()),
            },
        )
        .await;
        let _ = ws.close(None).await;
        vec![join]
    })
    .await;

    let mut connected = WsTransport::new(url)
        .connect("token-alice", ConnectOptions::manual_publish("demo"))
        .await
        .unwrap();

    match timeout(WAIT, connected.events.recv()).await.unwrap() {
        Some(RoomEvent::Disconnected { reason }) => assert_eq!(reason.as_deref(), Some("room closed")),
        other => panic!("expected disconnect, got {:?}", other),
    }
    // no second disconnect for the socket close
    assert_eq!(timeout(WAIT, connected.events.recv()).await.unwrap(), None);
}
