pub mod devices;
pub mod local;
#[cfg(feature = "native-capture")]
pub mod native;
pub mod native_messaging;
pub mod screen;
pub mod track;

use thiserror::Error;

pub use devices::{DisplayCaptureRequest, MediaDevices, MediaStream, RawTrack, SyntheticDevices};
pub use local::{LocalMediaManager, Preview};
#[cfg(feature = "native-capture")]
pub use native::NativeDevices;
pub use native_messaging::NativeMessagingHost;
pub use screen::{
    CaptureSource, CaptureSourceProvider, DesktopCapturer, ExtensionMessenger, ScreenShareError,
    ScreenShareNegotiator, SourcePicker,
};
pub use track::{LocalTrack, TrackSource};

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no capture device found")]
    NoDevice,

    #[error("capture source not found: {0}")]
    SourceNotFound(String),

    #[error("capture failed: {0}")]
    Capture(String),
}
