//! Room session coordinator
//!
//! Owns the (single) active room, the page view model and the screen-share
//! state. All of it is mutated from one task, in the order commands and room
//! events arrive.
//!
//! Phases: `Idle -> Joining -> Joined -> Left`. A failed connect drops back
//! to `Idle`; leaving or a server-side disconnect moves to `Left`.

use quickroom_protocol::TokenGrant;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::diagnostics::{DiagnosticsHandle, Report};
use crate::error::{ClientError, Result};
use crate::media::local::attach_tracks;
use crate::media::screen::ScreenShareError;
use crate::media::{LocalMediaManager, LocalTrack, Preview, ScreenShareNegotiator};
use crate::network::TokenProvider;
use crate::room_details::RoomDetails;
use crate::transport::{
    ConnectOptions, ConnectedRoom, RemoteParticipant, Room, RoomEvent, RoomEvents, Transport,
};
use crate::view::controls::{
    DISABLE_VIDEO_LABEL, ENABLE_VIDEO_LABEL, MUTE_AUDIO_LABEL, SHARE_SCREEN_LABEL, STOP_SHARING_LABEL,
    UNMUTE_AUDIO_LABEL,
};
use crate::view::{MediaElement, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Joining,
    Joined,
    Left,
}

/// User actions coming from the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleMute,
    ToggleVideo,
    ToggleScreenShare,
    OpenBugReport,
    EditBugDetails(String),
    SendReport,
    /// Leave the room and stop the coordinator (window closing)
    Leave,
}

enum Internal {
    ScreenShareNegotiated(std::result::Result<LocalTrack, ScreenShareError>),
    ScreenShareStopped(String),
}

/// Outcome of pressing the share button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShareToggle {
    /// Button is disabled while a negotiation is in flight
    Ignored,
    NotJoined,
    Start,
    Stop,
}

pub struct Session {
    pub room_name: String,
    pub identity: String,
    room: Box<dyn Room>,
}

impl Session {
    pub fn room(&self) -> &dyn Room {
        self.room.as_ref()
    }
}

struct ParticipantView {
    identity: String,
    tracks: Vec<String>,
}

#[derive(Default)]
struct ScreenShareState {
    sharing: bool,
    track: Option<LocalTrack>,
}

/// What the UI renders
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub phase: SessionPhase,
    pub room_name: Option<String>,
    pub identity: Option<String>,
    pub participants: Vec<String>,
    pub page: Page,
    /// Handle of the active screen share, so the capture can be ended from outside
    pub screen_share: Option<LocalTrack>,
}

pub struct SessionCoordinator {
    phase: SessionPhase,
    session: Option<Session>,
    page: Page,
    media: LocalMediaManager,
    participants: HashMap<String, ParticipantView>,
    screen: ScreenShareState,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    negotiator: Arc<ScreenShareNegotiator>,
    diagnostics: DiagnosticsHandle,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: Option<mpsc::UnboundedReceiver<Internal>>,
    snapshots: Option<watch::Sender<PageSnapshot>>,
}

impl SessionCoordinator {
    pub fn new(
        media: LocalMediaManager,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        negotiator: Arc<ScreenShareNegotiator>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            phase: SessionPhase::Idle,
            session: None,
            page: Page::new(),
            media,
            participants: HashMap::new(),
            screen: ScreenShareState::default(),
            transport,
            tokens,
            negotiator,
            diagnostics: DiagnosticsHandle::disabled(),
            internal_tx,
            internal_rx: Some(internal_rx),
            snapshots: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsHandle) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Publish a snapshot after every step; returns the receiving side
    pub fn subscribe_snapshots(&mut self) -> watch::Receiver<PageSnapshot> {
        let (tx, rx) = watch::channel(self.snapshot());
        self.snapshots = Some(tx);
        rx
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn media(&self) -> &LocalMediaManager {
        &self.media
    }

    pub fn is_screen_shared(&self) -> bool {
        self.screen.sharing
    }

    pub fn screen_share_track(&self) -> Option<&LocalTrack> {
        self.screen.track.as_ref()
    }

    pub fn snapshot(&self) -> PageSnapshot {
        let mut participants: Vec<String> =
            self.participants.values().map(|p| p.identity.clone()).collect();
        participants.sort();
        PageSnapshot {
            phase: self.phase,
            room_name: self.session.as_ref().map(|s| s.room_name.clone()),
            identity: self.session.as_ref().map(|s| s.identity.clone()),
            participants,
            page: self.page.clone(),
            screen_share: self.screen.track.clone(),
        }
    }

    fn publish_snapshot(&self) {
        if let Some(tx) = &self.snapshots {
            tx.send_replace(self.snapshot());
        }
    }

    // Joining

    pub async fn start_preview(&mut self, already_joined: bool) -> Preview {
        self.media
            .start_preview(already_joined, &mut self.page.local_media)
            .await
    }

    /// Token request followed by `join`. `Ok(None)` when there is no room to join.
    pub async fn get_token_and_join(&mut self, details: &RoomDetails) -> Result<Option<RoomEvents>> {
        let grant = match self
            .tokens
            .request_token(&details.room_name, details.room_type)
            .await
        {
            Ok(grant) => grant,
            Err(e) => {
                tracing::error!("Could not obtain a token: {}", e);
                return Err(e);
            }
        };

        if details.room_name.is_empty() {
            tracing::info!("No room name given; staying in preview");
            return Ok(None);
        }

        tracing::info!("Joining room '{}'...", details.room_name);
        self.join(&details.room_name, grant).await.map(Some)
    }

    pub async fn join(&mut self, room_name: &str, grant: TokenGrant) -> Result<RoomEvents> {
        if self.session.is_some() || self.phase == SessionPhase::Joining {
            return Err(ClientError::AlreadyJoined);
        }

        self.phase = SessionPhase::Joining;
        match self
            .transport
            .connect(&grant.token, ConnectOptions::manual_publish(room_name))
            .await
        {
            Ok(connected) => Ok(self.room_joined(room_name, grant.identity, connected).await),
            Err(e) => {
                tracing::error!("Could not connect to room '{}': {}", room_name, e);
                self.phase = SessionPhase::Idle;
                Err(ClientError::Connect(e))
            }
        }
    }

    async fn room_joined(&mut self, room_name: &str, identity: String, connected: ConnectedRoom) -> RoomEvents {
        let ConnectedRoom { room, events } = connected;
        tracing::info!("Joined as '{}'", identity);

        self.page.controls.show_session_controls(true);
        let available = self.negotiator.provider().is_available().await;
        tracing::debug!(
            "Screen share via {} bridge available: {}",
            self.negotiator.provider().name(),
            available
        );
        self.page.controls.show_screen_share(available);

        for track in self.media.tracks() {
            match room.publish_track(track).await {
                Ok(publication) => {
                    tracing::info!("Successfully published track {}", publication.track_sid)
                }
                Err(e) => tracing::error!("Failed to publish track {}: {}", track.name(), e),
            }
        }

        if !self.page.local_media.has_video() {
            attach_tracks(self.media.tracks(), &mut self.page.local_media);
        }

        let present = room.participants();
        self.session = Some(Session {
            room_name: room_name.to_string(),
            identity,
            room,
        });
        self.phase = SessionPhase::Joined;

        // The event channel has been buffering since connect, so anyone
        // joining during this loop is handled right after it.
        for participant in present {
            tracing::info!("Already in Room: '{}'", participant.identity);
            self.on_add_participant(participant);
        }

        events
    }

    fn on_add_participant(&mut self, participant: RemoteParticipant) {
        if self.participants.contains_key(&participant.sid) {
            tracing::debug!("Participant '{}' already observed", participant.identity);
            return;
        }

        tracing::info!("Joining: '{}'", participant.identity);
        if !participant.tracks.is_empty() {
            tracing::debug!(
                "Tracks were already present for '{}': {}",
                participant.identity,
                participant.tracks.len()
            );
        }

        let mut view = ParticipantView {
            identity: participant.identity,
            tracks: Vec::new(),
        };
        for track in participant.tracks {
            self.page.remote_media.attach(MediaElement::remote(
                track.sid.clone(),
                track.kind,
                track.name,
                view.identity.clone(),
            ));
            view.tracks.push(track.sid);
        }
        self.participants.insert(participant.sid, view);
    }

    // Room events

    pub fn handle_room_event(&mut self, event: RoomEvent) {
        if self.session.is_none() {
            tracing::debug!("Ignoring room event without a session: {:?}", event);
            return;
        }

        match event {
            RoomEvent::ParticipantConnected(participant) => self.on_add_participant(participant),
            RoomEvent::TrackAdded {
                participant_sid,
                track,
            } => {
                let Some(view) = self.participants.get_mut(&participant_sid) else {
                    tracing::warn!("Track {} added by unknown participant {}", track.sid, participant_sid);
                    return;
                };
                tracing::info!("{} added track: {}", view.identity, track.kind);
                self.page.remote_media.attach(MediaElement::remote(
                    track.sid.clone(),
                    track.kind,
                    track.name,
                    view.identity.clone(),
                ));
                if !view.tracks.contains(&track.sid) {
                    view.tracks.push(track.sid);
                }
            }
            RoomEvent::TrackRemoved {
                participant_sid,
                track_sid,
            } => {
                if let Some(view) = self.participants.get_mut(&participant_sid) {
                    tracing::info!("{} removed track: {}", view.identity, track_sid);
                    view.tracks.retain(|sid| sid != &track_sid);
                }
                self.page.detach_track(&track_sid);
            }
            RoomEvent::TrackSubscriptionFailed {
                participant_sid,
                track_sid,
                track_name,
                error,
            } => {
                tracing::error!(
                    participant = %participant_sid,
                    "Failed to subscribe to RemoteTrack {} with name \"{}\": {}",
                    track_sid,
                    track_name,
                    error
                );
            }
            RoomEvent::ParticipantDisconnected { participant_sid } => {
                if let Some(view) = self.participants.remove(&participant_sid) {
                    tracing::info!("Participant '{}' left the room", view.identity);
                    for sid in &view.tracks {
                        self.page.detach_track(sid);
                    }
                }
            }
            RoomEvent::Disconnected { reason } => self.on_disconnected(reason),
        }
    }

    /// Tear down after the room is gone. No-op without a session.
    fn on_disconnected(&mut self, reason: Option<String>) {
        let Some(session) = self.session.take() else {
            return;
        };
        tracing::info!(
            "Left room '{}' ({})",
            session.room_name,
            reason.as_deref().unwrap_or("disconnected")
        );

        self.media.stop_all();
        for track in self.media.tracks() {
            self.page.detach_track(track.id());
        }

        if let Some(track) = self.screen.track.take() {
            track.stop();
            self.page.detach_track(track.id());
        }
        self.screen.sharing = false;
        self.page.controls.share_screen.disabled = false;
        self.page.controls.share_screen.set_label(SHARE_SCREEN_LABEL);

        for (_, view) in self.participants.drain() {
            for sid in &view.tracks {
                self.page.detach_track(sid);
            }
        }

        self.page.controls.show_session_controls(false);
        self.phase = SessionPhase::Left;
    }

    /// Disconnect if joined; calling it again (or before joining) does nothing.
    pub async fn leave(&mut self) {
        let Some(session) = &self.session else {
            tracing::debug!("Not in a room; nothing to leave");
            return;
        };
        session.room.disconnect().await;
        self.on_disconnected(Some("left".to_string()));
    }

    // Local toggles

    pub async fn toggle_audio_mute(&mut self) -> bool {
        let muted = self.media.toggle_audio_mute();
        self.page.controls.mute_audio.set_label(if muted {
            UNMUTE_AUDIO_LABEL
        } else {
            MUTE_AUDIO_LABEL
        });

        if let Some(session) = &self.session {
            for track in self.media.tracks().iter().filter(|t| t.kind() == quickroom_protocol::TrackKind::Audio) {
                if let Err(e) = session.room.track_enabled_changed(track).await {
                    tracing::warn!("Could not signal mute for {}: {}", track.name(), e);
                }
            }
        }
        muted
    }

    pub async fn toggle_video(&mut self) -> bool {
        let disabled = self.media.toggle_video();
        self.page.controls.disable_video.set_label(if disabled {
            ENABLE_VIDEO_LABEL
        } else {
            DISABLE_VIDEO_LABEL
        });

        if let Some(session) = &self.session {
            for track in self.media.tracks().iter().filter(|t| t.kind() == quickroom_protocol::TrackKind::Video) {
                if let Err(e) = session.room.track_enabled_changed(track).await {
                    tracing::warn!("Could not signal video state for {}: {}", track.name(), e);
                }
            }
        }
        disabled
    }

    // Screen share

    fn toggle_share_flag(&mut self) -> ShareToggle {
        if self.page.controls.share_screen.disabled {
            return ShareToggle::Ignored;
        }
        if self.session.is_none() {
            return ShareToggle::NotJoined;
        }

        self.screen.sharing = !self.screen.sharing;
        self.page.controls.share_screen.disabled = true;
        if self.screen.sharing {
            ShareToggle::Start
        } else {
            ShareToggle::Stop
        }
    }

    /// Press the share button and run the whole negotiation inline.
    ///
    /// Starting fails (and reverts the button) if any step of the chain fails;
    /// pressing it while sharing stops the share.
    pub async fn start_screen_share(&mut self) -> Result<()> {
        match self.toggle_share_flag() {
            ShareToggle::Ignored => Ok(()),
            ShareToggle::NotJoined => Err(ClientError::NotJoined),
            ShareToggle::Stop => self.end_screen_share().await,
            ShareToggle::Start => {
                let negotiated = self.negotiator.negotiate().await;
                self.finish_screen_share(negotiated).await
            }
        }
    }

    async fn finish_screen_share(
        &mut self,
        negotiated: std::result::Result<LocalTrack, ScreenShareError>,
    ) -> Result<()> {
        let track = match negotiated {
            Ok(track) => track,
            Err(e) => {
                self.revert_share_toggle();
                tracing::error!("Could not get stream: {}", e);
                return Err(e.into());
            }
        };

        if self.screen.track.is_some() {
            track.stop();
            self.revert_share_toggle();
            return Err(ScreenShareError::AlreadySharing.into());
        }

        let Some(session) = &self.session else {
            // left the room while the picker was open
            track.stop();
            self.revert_share_toggle();
            return Err(ClientError::NotJoined);
        };

        // One-shot: fires once when the platform (or we) stop the capture
        let observed = track.clone();
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            observed.stopped().await;
            let _ = internal_tx.send(Internal::ScreenShareStopped(observed.id().to_string()));
        });

        match session.room.publish_track(&track).await {
            Ok(publication) => tracing::info!("Published screen share {}", publication.track_sid),
            Err(e) => tracing::error!("Failed to publish screen share: {}", e),
        }

        self.page.local_media.attach(
            MediaElement::local(track.id(), track.kind(), track.name()).tagged_screen_share(),
        );
        self.screen.track = Some(track);
        self.page.controls.share_screen.disabled = false;
        self.page.controls.share_screen.set_label(STOP_SHARING_LABEL);
        Ok(())
    }

    fn revert_share_toggle(&mut self) {
        self.screen.sharing = false;
        self.page.controls.share_screen.disabled = false;
    }

    /// User asked to stop: stop the capture, then tear the share down
    async fn end_screen_share(&mut self) -> Result<()> {
        if let Some(track) = &self.screen.track {
            track.stop();
        }
        self.stop_screen_share().await
    }

    /// Unpublish and detach the screen share. A failed unpublish is returned
    /// to the caller and leaves the share button disabled.
    pub async fn stop_screen_share(&mut self) -> Result<()> {
        self.screen.sharing = false;
        let Some(track) = self.screen.track.clone() else {
            self.page.controls.share_screen.disabled = false;
            return Ok(());
        };

        if let Some(session) = &self.session {
            session
                .room
                .unpublish_track(&track)
                .await
                .map_err(ClientError::ScreenShareTeardown)?;
        }

        self.screen.track = None;
        self.page.detach_track(track.id());
        self.page.controls.share_screen.disabled = false;
        self.page.controls.share_screen.set_label(SHARE_SCREEN_LABEL);
        Ok(())
    }

    // Bug reports

    pub fn open_bug_report(&mut self) {
        self.page.controls.open_bug_report();
    }

    pub fn edit_bug_details(&mut self, text: String) {
        self.page.controls.bug_details.value = text;
    }

    pub fn send_bug_report(&mut self) {
        let message = self.page.controls.submit_bug_report();
        tracing::info!("Sending bug report ({} chars)", message.len());
        self.diagnostics.report(Report::bug_report(message));
    }

    // Event loop

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::ToggleMute => {
                self.toggle_audio_mute().await;
            }
            Command::ToggleVideo => {
                self.toggle_video().await;
            }
            Command::ToggleScreenShare => match self.toggle_share_flag() {
                ShareToggle::Ignored => tracing::debug!("Screen share negotiation in progress"),
                ShareToggle::NotJoined => tracing::warn!("Cannot share screen before joining"),
                ShareToggle::Stop => {
                    if let Err(e) = self.end_screen_share().await {
                        self.report_uncaught(&e);
                    }
                }
                ShareToggle::Start => {
                    let negotiator = self.negotiator.clone();
                    let internal_tx = self.internal_tx.clone();
                    tokio::spawn(async move {
                        let negotiated = negotiator.negotiate().await;
                        let _ = internal_tx.send(Internal::ScreenShareNegotiated(negotiated));
                    });
                }
            },
            Command::OpenBugReport => self.open_bug_report(),
            Command::EditBugDetails(text) => self.edit_bug_details(text),
            Command::SendReport => self.send_bug_report(),
            Command::Leave => self.leave().await,
        }
    }

    async fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::ScreenShareNegotiated(negotiated) => {
                // failures are already logged and reverted
                let _ = self.finish_screen_share(negotiated).await;
            }
            Internal::ScreenShareStopped(track_id) => {
                let current = self.screen.track.as_ref().map(|t| t.id() == track_id);
                if current == Some(true) {
                    if let Err(e) = self.stop_screen_share().await {
                        self.report_uncaught(&e);
                    }
                }
            }
        }
    }

    fn report_uncaught(&self, error: &ClientError) {
        tracing::error!("{}", error);
        self.diagnostics
            .report(Report::exception("ClientError", error.to_string()));
    }

    /// Startup flow followed by the event loop.
    ///
    /// Previews local media, joins `details`' room, then processes commands,
    /// room events and screen-share results until `Command::Leave` or until
    /// every command sender is dropped.
    pub async fn run(mut self, details: RoomDetails, mut commands: mpsc::Receiver<Command>) {
        let Some(mut internal_rx) = self.internal_rx.take() else {
            tracing::error!("Session coordinator is already running");
            return;
        };

        let preview = self.start_preview(false).await;
        tracing::debug!("Previewing {} local track(s)", preview.tracks.len());
        self.publish_snapshot();

        let mut events = if preview.join_requested {
            self.get_token_and_join(&details).await.ok().flatten()
        } else {
            None
        };
        self.publish_snapshot();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Leave) | None => {
                        self.leave().await;
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                },
                event = next_event(&mut events) => match event {
                    Some(event) => self.handle_room_event(event),
                    None => events = None,
                },
                Some(internal) = internal_rx.recv() => self.handle_internal(internal).await,
            }
            self.publish_snapshot();
        }

        self.publish_snapshot();
        tracing::info!("Session coordinator stopped");
    }
}

async fn next_event(events: &mut Option<RoomEvents>) -> Option<RoomEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
