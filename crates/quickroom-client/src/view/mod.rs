//! Page view model
//!
//! The coordinator mutates these; the UI only ever renders snapshots of them.

pub mod container;
pub mod controls;

pub use container::{MediaContainer, MediaElement};
pub use controls::{Button, Controls, TextInput};

/// Element ids the page exposes
pub mod ids {
    pub const LOCAL_MEDIA: &str = "local-media";
    pub const REMOTE_MEDIA: &str = "remote-media";
    pub const MUTE_AUDIO: &str = "mute-audio";
    pub const DISABLE_VIDEO: &str = "disable-video";
    pub const SHARE_SCREEN: &str = "share-screen";
    pub const INSTALL_BUTTON: &str = "install-button";
    pub const BUG_DETAILS: &str = "bug-details";
    pub const SEND_REPORT: &str = "send-report";
    pub const REPORT_BUG: &str = "report-bug";
}

/// Both media containers plus the controls
#[derive(Debug, Clone)]
pub struct Page {
    pub local_media: MediaContainer,
    pub remote_media: MediaContainer,
    pub controls: Controls,
}

impl Page {
    pub fn new() -> Self {
        Self {
            local_media: MediaContainer::new(ids::LOCAL_MEDIA),
            remote_media: MediaContainer::new(ids::REMOTE_MEDIA),
            controls: Controls::new(),
        }
    }

    /// Remove a track's element wherever it is attached
    pub fn detach_track(&mut self, track_id: &str) -> bool {
        let local = self.local_media.detach(track_id).is_some();
        let remote = self.remote_media.detach(track_id).is_some();
        local || remote
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
