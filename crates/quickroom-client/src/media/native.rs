//! Capture device discovery through cpal (microphones) and nokhwa (cameras)
//!
//! Only the default devices are opened as tracks; the pixels and samples
//! themselves are pulled by the transport. Display enumeration has no
//! portable backend yet, so only the primary monitor is offered and window
//! capture is unavailable.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};
use quickroom_protocol::{CaptureSourceType, TrackKind};

use super::devices::{ensure_known_source, DisplayCaptureRequest, MediaDevices, MediaStream, RawTrack};
use super::screen::{CaptureSource, DesktopCapturer};
use super::track::{LocalTrack, TrackSource};
use super::MediaError;

#[derive(Debug, Clone)]
pub struct VideoDeviceInfo {
    pub index: u32,
    pub name: String,
}

/// A display that can be shared whole
#[derive(Debug, Clone)]
pub struct MonitorInfo {
    pub id: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
}

/// A top-level window that can be shared on its own
#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub id: u64,
    pub title: String,
}

#[derive(Default)]
pub struct NativeDevices;

impl NativeDevices {
    pub fn new() -> Self {
        Self
    }

    pub fn list_cameras() -> Result<Vec<VideoDeviceInfo>, MediaError> {
        let devices = nokhwa::query(nokhwa::utils::ApiBackend::Auto)
            .map_err(|e| MediaError::Capture(e.to_string()))?;
        Ok(devices
            .iter()
            .map(|d| VideoDeviceInfo {
                index: d.index().as_index().unwrap_or(0),
                name: d.human_name().to_string(),
            })
            .collect())
    }

    pub fn default_microphone() -> Option<String> {
        let host = cpal::default_host();
        host.default_input_device().and_then(|d| d.name().ok())
    }

    pub fn list_monitors() -> Vec<MonitorInfo> {
        vec![MonitorInfo {
            id: 0,
            name: "Primary Display".to_string(),
            width: 1920,
            height: 1080,
            is_primary: true,
        }]
    }

    pub fn list_windows() -> Vec<WindowInfo> {
        Vec::new()
    }

    fn sources(types: &[CaptureSourceType]) -> Vec<CaptureSource> {
        capture_sources(&Self::list_monitors(), &Self::list_windows(), types)
    }
}

/// Desktop-capturer style sources: `screen:<id>:0` and `window:<id>:0`
pub fn capture_sources(
    monitors: &[MonitorInfo],
    windows: &[WindowInfo],
    types: &[CaptureSourceType],
) -> Vec<CaptureSource> {
    let mut sources = Vec::new();
    if types.contains(&CaptureSourceType::Screen) {
        sources.extend(monitors.iter().map(|m| CaptureSource {
            id: format!("screen:{}:0", m.id),
            name: if m.is_primary {
                format!("{} ({}x{}, primary)", m.name, m.width, m.height)
            } else {
                format!("{} ({}x{})", m.name, m.width, m.height)
            },
            source_type: CaptureSourceType::Screen,
        }));
    }
    if types.contains(&CaptureSourceType::Window) {
        sources.extend(windows.iter().map(|w| CaptureSource {
            id: format!("window:{}:0", w.id),
            name: w.title.clone(),
            source_type: CaptureSourceType::Window,
        }));
    }
    sources
}

#[async_trait]
impl DesktopCapturer for NativeDevices {
    async fn get_sources(&self, types: &[CaptureSourceType]) -> Result<Vec<CaptureSource>, MediaError> {
        Ok(Self::sources(types))
    }
}

#[async_trait]
impl MediaDevices for NativeDevices {
    async fn create_local_tracks(&self) -> Result<Vec<LocalTrack>, MediaError> {
        // device probing blocks on some backends
        let (microphone, cameras) = tokio::task::spawn_blocking(|| {
            (Self::default_microphone(), Self::list_cameras())
        })
        .await
        .map_err(|e| MediaError::Capture(e.to_string()))?;

        let mut tracks = Vec::new();
        if let Some(name) = microphone {
            tracks.push(LocalTrack::new(
                format!("mic-{}", uuid::Uuid::new_v4()),
                name,
                TrackKind::Audio,
                TrackSource::Microphone,
            ));
        }

        match cameras {
            Ok(cameras) => {
                if let Some(camera) = cameras.first() {
                    tracks.push(LocalTrack::new(
                        format!("cam-{}-{}", camera.index, uuid::Uuid::new_v4()),
                        camera.name.clone(),
                        TrackKind::Video,
                        TrackSource::Camera,
                    ));
                }
            }
            Err(e) => tracing::warn!("Failed to list cameras: {}", e),
        }

        if tracks.is_empty() {
            return Err(MediaError::NoDevice);
        }
        Ok(tracks)
    }

    async fn get_display_media(&self, request: &DisplayCaptureRequest) -> Result<MediaStream, MediaError> {
        let offered = Self::sources(&[CaptureSourceType::Screen, CaptureSourceType::Window]);
        ensure_known_source(&offered, &request.source_id)?;

        Ok(MediaStream {
            tracks: vec![RawTrack {
                id: format!("screen-{}", uuid::Uuid::new_v4()),
                kind: TrackKind::Video,
                label: format!(
                    "{} ({}x{}@{})",
                    request.source_id, request.max_width, request.max_height, request.max_frame_rate
                ),
            }],
        })
    }
}
