//! Platform capture access
//!
//! `MediaDevices` is the seam to whatever actually captures camera,
//! microphone and screen. `SyntheticDevices` produces generated tracks, which
//! is what the client uses when no real capture backend is configured.

use async_trait::async_trait;
use quickroom_protocol::{CaptureSourceType, TrackKind};
use uuid::Uuid;

use super::screen::{CaptureSource, DesktopCapturer};
use super::track::{LocalTrack, TrackSource};
use super::MediaError;

/// Constraints for a display capture, keyed by a capture-source id
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCaptureRequest {
    pub source_id: String,
    pub max_width: u32,
    pub max_height: u32,
    pub max_frame_rate: u32,
    pub min_aspect_ratio: f64,
}

/// A raw captured track before it is wrapped as a `LocalTrack`
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrack {
    pub id: String,
    pub kind: TrackKind,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    pub tracks: Vec<RawTrack>,
}

impl MediaStream {
    pub fn video_tracks(&self) -> impl Iterator<Item = &RawTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Capture the default camera and microphone
    async fn create_local_tracks(&self) -> Result<Vec<LocalTrack>, MediaError>;

    /// Capture the display surface identified by `request.source_id`
    async fn get_display_media(&self, request: &DisplayCaptureRequest) -> Result<MediaStream, MediaError>;
}

/// Reject desktop-style ids (`screen:..`, `window:..`) that were not offered by
/// `get_sources`. Extension stream ids are opaque and pass through.
pub(crate) fn ensure_known_source(sources: &[CaptureSource], source_id: &str) -> Result<(), MediaError> {
    let desktop_id = source_id.starts_with("screen:") || source_id.starts_with("window:");
    if desktop_id && !sources.iter().any(|s| s.id == source_id) {
        return Err(MediaError::SourceNotFound(source_id.to_string()));
    }
    Ok(())
}

/// Generated camera, microphone and screens
pub struct SyntheticDevices {
    deny_user_media: bool,
    sources: Vec<CaptureSource>,
}

impl SyntheticDevices {
    pub fn new() -> Self {
        Self {
            deny_user_media: false,
            sources: vec![
                CaptureSource {
                    id: "screen:0:0".to_string(),
                    name: "Entire screen".to_string(),
                    source_type: CaptureSourceType::Screen,
                },
                CaptureSource {
                    id: "window:1:0".to_string(),
                    name: "Quickroom".to_string(),
                    source_type: CaptureSourceType::Window,
                },
            ],
        }
    }

    /// Behave like a user who refused camera/microphone access
    pub fn denying_user_media() -> Self {
        Self {
            deny_user_media: true,
            ..Self::new()
        }
    }
}

impl Default for SyntheticDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn create_local_tracks(&self) -> Result<Vec<LocalTrack>, MediaError> {
        if self.deny_user_media {
            return Err(MediaError::PermissionDenied(
                "camera and microphone access refused".to_string(),
            ));
        }

        Ok(vec![
            LocalTrack::new(
                Uuid::new_v4().to_string(),
                "Synthetic microphone",
                TrackKind::Audio,
                TrackSource::Microphone,
            ),
            LocalTrack::new(
                Uuid::new_v4().to_string(),
                "Synthetic camera",
                TrackKind::Video,
                TrackSource::Camera,
            ),
        ])
    }

    async fn get_display_media(&self, request: &DisplayCaptureRequest) -> Result<MediaStream, MediaError> {
        ensure_known_source(&self.sources, &request.source_id)?;

        Ok(MediaStream {
            tracks: vec![RawTrack {
                id: Uuid::new_v4().to_string(),
                kind: TrackKind::Video,
                label: format!(
                    "{} ({}x{}@{})",
                    request.source_id, request.max_width, request.max_height, request.max_frame_rate
                ),
            }],
        })
    }
}

#[async_trait]
impl DesktopCapturer for SyntheticDevices {
    async fn get_sources(&self, types: &[CaptureSourceType]) -> Result<Vec<CaptureSource>, MediaError> {
        Ok(self
            .sources
            .iter()
            .filter(|s| types.contains(&s.source_type))
            .cloned()
            .collect())
    }
}
