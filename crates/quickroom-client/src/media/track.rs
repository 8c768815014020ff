//! Local media tracks
//!
//! A `LocalTrack` is a cheap clonable handle; clones share the enabled flag
//! and the stop signal.

use quickroom_protocol::TrackKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// Where a local track's media comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
}

#[derive(Debug, Clone)]
pub struct LocalTrack {
    inner: Arc<TrackInner>,
}

#[derive(Debug)]
struct TrackInner {
    id: String,
    name: String,
    kind: TrackKind,
    source: TrackSource,
    enabled: AtomicBool,
    stopped: watch::Sender<bool>,
}

impl LocalTrack {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: TrackKind, source: TrackSource) -> Self {
        let (stopped, _) = watch::channel(false);
        Self {
            inner: Arc::new(TrackInner {
                id: id.into(),
                name: name.into(),
                kind,
                source,
                enabled: AtomicBool::new(true),
                stopped,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn source(&self) -> TrackSource {
        self.inner.source
    }

    pub fn is_screen_share(&self) -> bool {
        self.inner.source == TrackSource::Screen
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    pub fn enable(&self) {
        self.set_enabled(true);
    }

    pub fn disable(&self) {
        self.set_enabled(false);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Stop capturing. Idempotent; wakes every `stopped()` waiter once.
    pub fn stop(&self) {
        self.inner.stopped.send_if_modified(|stopped| {
            let changed = !*stopped;
            *stopped = true;
            changed
        });
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.borrow()
    }

    /// Resolves once the track has been stopped, by us or by the platform.
    pub async fn stopped(&self) {
        let mut rx = self.inner.stopped.subscribe();
        // the sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    pub fn same_track(&self, other: &LocalTrack) -> bool {
        self.id() == other.id()
    }
}
