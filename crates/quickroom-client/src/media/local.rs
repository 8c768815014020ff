//! Local camera/microphone tracks and their mute/disable toggles

use quickroom_protocol::TrackKind;
use std::sync::Arc;

use super::devices::MediaDevices;
use super::track::LocalTrack;
use crate::view::{MediaContainer, MediaElement};

/// Result of `start_preview`
#[derive(Debug, Clone)]
pub struct Preview {
    pub tracks: Vec<LocalTrack>,
    /// Whether the caller should continue with the join flow
    pub join_requested: bool,
}

pub struct LocalMediaManager {
    devices: Arc<dyn MediaDevices>,
    tracks: Option<Vec<LocalTrack>>,
    audio_muted: bool,
    video_disabled: bool,
}

impl LocalMediaManager {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            tracks: None,
            audio_muted: false,
            video_disabled: false,
        }
    }

    pub fn devices(&self) -> Arc<dyn MediaDevices> {
        self.devices.clone()
    }

    /// Acquire (once) and preview the local tracks.
    ///
    /// A capture failure is logged and degrades to an empty track set; the
    /// join flow is requested either way unless we are already in a room.
    pub async fn start_preview(&mut self, already_joined: bool, container: &mut MediaContainer) -> Preview {
        let tracks = match &self.tracks {
            Some(tracks) => Ok(tracks.clone()),
            None => self.devices.create_local_tracks().await,
        };

        let tracks = match tracks {
            Ok(tracks) => {
                self.tracks = Some(tracks.clone());
                if !container.has_video() {
                    attach_tracks(&tracks, container);
                }
                tracks
            }
            Err(e) => {
                tracing::error!("Unable to access local media: {}", e);
                tracing::info!("Unable to access Camera and Microphone");
                Vec::new()
            }
        };

        Preview {
            tracks,
            join_requested: !already_joined,
        }
    }

    /// Tracks acquired so far (empty before a successful preview)
    pub fn tracks(&self) -> &[LocalTrack] {
        self.tracks.as_deref().unwrap_or_default()
    }

    pub fn is_audio_muted(&self) -> bool {
        self.audio_muted
    }

    pub fn is_video_disabled(&self) -> bool {
        self.video_disabled
    }

    /// Flip mute; returns the new muted state
    pub fn toggle_audio_mute(&mut self) -> bool {
        self.audio_muted = !self.audio_muted;
        for track in self.tracks().iter().filter(|t| t.kind() == TrackKind::Audio) {
            track.set_enabled(!self.audio_muted);
        }
        self.audio_muted
    }

    /// Flip camera; returns the new disabled state. Only camera and microphone
    /// tracks live here, so an active screen share is never touched.
    pub fn toggle_video(&mut self) -> bool {
        self.video_disabled = !self.video_disabled;
        for track in self.tracks().iter().filter(|t| t.kind() == TrackKind::Video) {
            track.set_enabled(!self.video_disabled);
        }
        self.video_disabled
    }

    pub fn stop_all(&self) {
        for track in self.tracks() {
            track.stop();
        }
    }
}

pub(crate) fn attach_tracks(tracks: &[LocalTrack], container: &mut MediaContainer) {
    for track in tracks {
        let element = MediaElement::local(track.id(), track.kind(), track.name());
        let element = if track.is_screen_share() {
            element.tagged_screen_share()
        } else {
            element
        };
        container.attach(element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::SyntheticDevices;
    use crate::view::ids;

    fn manager(devices: SyntheticDevices) -> LocalMediaManager {
        LocalMediaManager::new(Arc::new(devices))
    }

    #[tokio::test]
    async fn test_preview_attaches_once_and_reuses_tracks() {
        let mut media = manager(SyntheticDevices::new());
        let mut container = MediaContainer::new(ids::LOCAL_MEDIA);

        let first = media.start_preview(false, &mut container).await;
        assert_eq!(first.tracks.len(), 2);
        assert!(first.join_requested);
        assert_eq!(container.len(), 2);

        let second = media.start_preview(true, &mut container).await;
        assert!(!second.join_requested);
        assert_eq!(container.len(), 2);
        let first_ids: Vec<_> = first.tracks.iter().map(|t| t.id().to_string()).collect();
        let second_ids: Vec<_> = second.tracks.iter().map(|t| t.id().to_string()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[tokio::test]
    async fn test_failed_capture_is_empty_and_still_joins() {
        let mut media = manager(SyntheticDevices::denying_user_media());
        let mut container = MediaContainer::new(ids::LOCAL_MEDIA);

        let preview = media.start_preview(false, &mut container).await;
        assert!(preview.tracks.is_empty());
        assert!(preview.join_requested);
        assert!(container.is_empty());
        assert!(media.tracks().is_empty());
    }

    #[tokio::test]
    async fn test_mute_only_touches_audio() {
        let mut media = manager(SyntheticDevices::new());
        let mut container = MediaContainer::new(ids::LOCAL_MEDIA);
        media.start_preview(false, &mut container).await;

        assert!(media.toggle_audio_mute());
        for track in media.tracks() {
            match track.kind() {
                TrackKind::Audio => assert!(!track.is_enabled()),
                TrackKind::Video => assert!(track.is_enabled()),
            }
        }
        assert!(!media.toggle_audio_mute());
        assert!(media.tracks().iter().all(|t| t.is_enabled()));
    }

    #[tokio::test]
    async fn test_disable_video_skips_audio() {
        let mut media = manager(SyntheticDevices::new());
        let mut container = MediaContainer::new(ids::LOCAL_MEDIA);
        media.start_preview(false, &mut container).await;

        assert!(media.toggle_video());
        for track in media.tracks() {
            match track.kind() {
                TrackKind::Audio => assert!(track.is_enabled()),
                TrackKind::Video => assert!(!track.is_enabled()),
            }
        }
    }
}
