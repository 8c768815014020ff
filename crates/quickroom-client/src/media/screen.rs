//! Screen-share negotiation
//!
//! A capture-source id comes from one of two bridges, picked at startup:
//! - `ExtensionBridge`: asks the browser extension over a message channel
//! - `DesktopBridge`: lists sources itself and lets the user pick one
//!
//! The id is then turned into a constrained display capture whose first
//! video track becomes the local screen-share track.

use async_trait::async_trait;
use quickroom_protocol::{CaptureSourceType, ExtensionRequest, ExtensionResponse, TrackKind};
use std::sync::Arc;
use thiserror::Error;

use super::devices::{DisplayCaptureRequest, MediaDevices};
use super::track::{LocalTrack, TrackSource};
use super::MediaError;
use crate::state::ScreenShareConfig;

#[derive(Error, Debug)]
pub enum ScreenShareError {
    #[error("extension error: {}", .0.as_deref().unwrap_or("no message"))]
    Extension(Option<String>),

    #[error("Unknown response")]
    UnknownResponse,

    #[error("could not reach extension: {0}")]
    Messaging(String),

    #[error("could not list capture sources: {0}")]
    Sources(String),

    #[error("no capture source selected")]
    SelectionCancelled,

    #[error("capture denied: {0}")]
    Capture(#[from] MediaError),

    #[error("display capture returned no video track")]
    NoVideoTrack,

    #[error("a screen share is already active")]
    AlreadySharing,
}

/// A window or screen offered by the desktop bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSource {
    pub id: String,
    pub name: String,
    pub source_type: CaptureSourceType,
}

/// Request/response channel to the screen-capture extension
#[async_trait]
pub trait ExtensionMessenger: Send + Sync {
    /// Whether the extension can be reached at all
    async fn is_installed(&self, extension_id: &str) -> bool;

    async fn send_message(
        &self,
        extension_id: &str,
        request: &ExtensionRequest,
    ) -> Result<serde_json::Value, ScreenShareError>;
}

/// Programmatic source enumeration on the desktop host
#[async_trait]
pub trait DesktopCapturer: Send + Sync {
    async fn get_sources(&self, types: &[CaptureSourceType]) -> Result<Vec<CaptureSource>, MediaError>;
}

/// Minimal UI for choosing one of the listed sources; `None` means cancelled
#[async_trait]
pub trait SourcePicker: Send + Sync {
    async fn pick(&self, sources: Vec<CaptureSource>) -> Option<String>;
}

#[derive(Clone)]
pub enum CaptureSourceProvider {
    ExtensionBridge {
        extension_id: String,
        messenger: Arc<dyn ExtensionMessenger>,
    },
    DesktopBridge {
        capturer: Arc<dyn DesktopCapturer>,
        picker: Arc<dyn SourcePicker>,
    },
}

impl CaptureSourceProvider {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureSourceProvider::ExtensionBridge { .. } => "extension",
            CaptureSourceProvider::DesktopBridge { .. } => "desktop",
        }
    }

    /// Whether screen sharing can be offered at all
    pub async fn is_available(&self) -> bool {
        match self {
            CaptureSourceProvider::ExtensionBridge {
                extension_id,
                messenger,
            } => messenger.is_installed(extension_id).await,
            CaptureSourceProvider::DesktopBridge { .. } => true,
        }
    }

    /// Obtain a capture-source id from whichever bridge this is
    pub async fn request_source_id(&self) -> Result<String, ScreenShareError> {
        match self {
            CaptureSourceProvider::ExtensionBridge {
                extension_id,
                messenger,
            } => {
                let request = ExtensionRequest::GetUserScreen {
                    sources: vec![
                        CaptureSourceType::Window,
                        CaptureSourceType::Screen,
                        CaptureSourceType::Tab,
                    ],
                };
                let reply = messenger.send_message(extension_id, &request).await?;
                match ExtensionResponse::from_value(reply) {
                    ExtensionResponse::Success { stream_id } => Ok(stream_id),
                    ExtensionResponse::Error { message } => {
                        tracing::error!(
                            "Error in getUserMedia: {}",
                            message.as_deref().unwrap_or("no message")
                        );
                        Err(ScreenShareError::Extension(message))
                    }
                    ExtensionResponse::Unknown => Err(ScreenShareError::UnknownResponse),
                }
            }
            CaptureSourceProvider::DesktopBridge { capturer, picker } => {
                let sources = capturer
                    .get_sources(&[CaptureSourceType::Window, CaptureSourceType::Screen])
                    .await
                    .map_err(|e| ScreenShareError::Sources(e.to_string()))?;
                let source_id = picker
                    .pick(sources)
                    .await
                    .ok_or(ScreenShareError::SelectionCancelled)?;
                tracing::info!("Selected Screen {}", source_id);
                Ok(source_id)
            }
        }
    }
}

/// Runs the bridge -> capture -> local track chain
pub struct ScreenShareNegotiator {
    provider: CaptureSourceProvider,
    devices: Arc<dyn MediaDevices>,
    constraints: ScreenShareConfig,
}

impl ScreenShareNegotiator {
    pub fn new(
        provider: CaptureSourceProvider,
        devices: Arc<dyn MediaDevices>,
        constraints: ScreenShareConfig,
    ) -> Self {
        Self {
            provider,
            devices,
            constraints,
        }
    }

    pub fn provider(&self) -> &CaptureSourceProvider {
        &self.provider
    }

    pub fn capture_request(&self, source_id: String) -> DisplayCaptureRequest {
        DisplayCaptureRequest {
            source_id,
            max_width: self.constraints.max_width,
            max_height: self.constraints.max_height,
            max_frame_rate: self.constraints.max_frame_rate,
            min_aspect_ratio: self.constraints.min_aspect_ratio,
        }
    }

    pub async fn negotiate(&self) -> Result<LocalTrack, ScreenShareError> {
        let source_id = self.provider.request_source_id().await?;
        let request = self.capture_request(source_id);
        let stream = self.devices.get_display_media(&request).await?;
        tracing::debug!("Display capture returned {} track(s)", stream.tracks.len());

        let raw = stream
            .video_tracks()
            .next()
            .ok_or(ScreenShareError::NoVideoTrack)?;

        Ok(LocalTrack::new(
            raw.id.clone(),
            raw.label.clone(),
            TrackKind::Video,
            TrackSource::Screen,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::SyntheticDevices;
    use crate::testing::{FixedPicker, ScriptedMessenger};
    use serde_json::json;

    fn extension(reply: serde_json::Value) -> CaptureSourceProvider {
        CaptureSourceProvider::ExtensionBridge {
            extension_id: "ext".to_string(),
            messenger: Arc::new(ScriptedMessenger::replying(reply)),
        }
    }

    fn negotiator(provider: CaptureSourceProvider) -> ScreenShareNegotiator {
        ScreenShareNegotiator::new(provider, Arc::new(SyntheticDevices::new()), ScreenShareConfig::default())
    }

    #[tokio::test]
    async fn test_extension_success() {
        let track = negotiator(extension(json!({"type": "success", "streamId": "stream-7"})))
            .negotiate()
            .await
            .unwrap();
        assert!(track.is_screen_share());
        assert_eq!(track.kind(), TrackKind::Video);
        assert!(track.name().starts_with("stream-7"));
    }

    #[tokio::test]
    async fn test_extension_error_and_unknown() {
        let err = negotiator(extension(json!({"type": "error", "message": "denied"})))
            .negotiate()
            .await
            .unwrap_err();
        assert!(matches!(err, ScreenShareError::Extension(Some(ref m)) if m == "denied"));

        let err = negotiator(extension(json!({"type": "whatever"})))
            .negotiate()
            .await
            .unwrap_err();
        assert!(matches!(err, ScreenShareError::UnknownResponse));
    }

    #[tokio::test]
    async fn test_desktop_bridge_picks_source() {
        let devices = Arc::new(SyntheticDevices::new());
        let provider = CaptureSourceProvider::DesktopBridge {
            capturer: devices.clone(),
            picker: Arc::new(FixedPicker(Some("screen:0:0".to_string()))),
        };
        assert!(provider.is_available().await);
        let track = negotiator(provider).negotiate().await.unwrap();
        assert!(track.name().contains("1920x1080@10"));
    }

    #[tokio::test]
    async fn test_desktop_bridge_cancelled() {
        let provider = CaptureSourceProvider::DesktopBridge {
            capturer: Arc::new(SyntheticDevices::new()),
            picker: Arc::new(FixedPicker(None)),
        };
        let err = negotiator(provider).negotiate().await.unwrap_err();
        assert!(matches!(err, ScreenShareError::SelectionCancelled));
    }

    #[tokio::test]
    async fn test_capture_constraints_from_config() {
        let constraints = ScreenShareConfig {
            max_frame_rate: 5,
            ..ScreenShareConfig::default()
        };
        let negotiator = ScreenShareNegotiator::new(
            extension(json!(null)),
            Arc::new(SyntheticDevices::new()),
            constraints,
        );
        let request = negotiator.capture_request("id".to_string());
        assert_eq!(request.max_frame_rate, 5);
        assert_eq!(request.max_width, 1920);
        assert_eq!(request.min_aspect_ratio, 1.77);
    }
}
