use quickroom_protocol::TrackKind;

/// One rendered track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaElement {
    pub track_id: String,
    pub kind: TrackKind,
    pub label: String,
    /// Identity of the participant owning the track, `None` for local tracks
    pub owner: Option<String>,
    /// Screen-share elements are tagged so camera toggles can skip them
    pub screen_share: bool,
}

impl MediaElement {
    pub fn local(track_id: impl Into<String>, kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            kind,
            label: label.into(),
            owner: None,
            screen_share: false,
        }
    }

    pub fn remote(
        track_id: impl Into<String>,
        kind: TrackKind,
        label: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            track_id: track_id.into(),
            kind,
            label: label.into(),
            owner: Some(owner.into()),
            screen_share: false,
        }
    }

    pub fn tagged_screen_share(mut self) -> Self {
        self.screen_share = true;
        self
    }
}

/// Ordered set of attached elements, unique by track id
#[derive(Debug, Clone)]
pub struct MediaContainer {
    id: &'static str,
    elements: Vec<MediaElement>,
}

impl MediaContainer {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            elements: Vec::new(),
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Append unless an element for the same track is already present.
    /// Returns whether anything was attached.
    pub fn attach(&mut self, element: MediaElement) -> bool {
        if self.contains(&element.track_id) {
            tracing::debug!("Track {} already attached to {}", element.track_id, self.id);
            return false;
        }
        self.elements.push(element);
        true
    }

    pub fn detach(&mut self, track_id: &str) -> Option<MediaElement> {
        let pos = self.elements.iter().position(|e| e.track_id == track_id)?;
        Some(self.elements.remove(pos))
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.elements.iter().any(|e| e.track_id == track_id)
    }

    /// Whether a video element is present (screen shares count too)
    pub fn has_video(&self) -> bool {
        self.elements.iter().any(|e| e.kind == TrackKind::Video)
    }

    pub fn elements(&self) -> &[MediaElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }
}
