pub const MUTE_AUDIO_LABEL: &str = "Mute Audio";
pub const UNMUTE_AUDIO_LABEL: &str = "UnMute Audio";
pub const DISABLE_VIDEO_LABEL: &str = "Disable Video";
pub const ENABLE_VIDEO_LABEL: &str = "Enable Video";
pub const SHARE_SCREEN_LABEL: &str = "Share Screen";
pub const STOP_SHARING_LABEL: &str = "Stop Sharing";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub visible: bool,
    pub disabled: bool,
}

impl Button {
    fn new(label: &str, visible: bool) -> Self {
        Self {
            label: label.to_string(),
            visible,
            disabled: false,
        }
    }

    pub fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    pub value: String,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controls {
    pub mute_audio: Button,
    pub disable_video: Button,
    pub share_screen: Button,
    pub install_button: Button,
    pub report_bug: Button,
    pub send_report: Button,
    pub bug_details: TextInput,
}

impl Controls {
    pub fn new() -> Self {
        Self {
            mute_audio: Button::new(MUTE_AUDIO_LABEL, false),
            disable_video: Button::new(DISABLE_VIDEO_LABEL, false),
            share_screen: Button::new(SHARE_SCREEN_LABEL, false),
            install_button: Button::new("Install Extension", false),
            report_bug: Button::new("Report Bug", true),
            send_report: Button::new("Send Report", false),
            bug_details: TextInput::default(),
        }
    }

    /// Reveal the bug-report input
    pub fn open_bug_report(&mut self) {
        self.send_report.visible = true;
        self.bug_details.visible = true;
        self.report_bug.visible = false;
    }

    /// Hide the input again and hand back (and clear) what was typed
    pub fn submit_bug_report(&mut self) -> String {
        self.report_bug.visible = true;
        self.send_report.visible = false;
        self.bug_details.visible = false;
        std::mem::take(&mut self.bug_details.value)
    }

    /// Session controls shown once a room is joined
    pub fn show_session_controls(&mut self, visible: bool) {
        self.mute_audio.visible = visible;
        self.disable_video.visible = visible;
        if !visible {
            self.share_screen.visible = false;
            self.install_button.visible = false;
        }
    }

    /// Offer screen sharing when a capture bridge exists, else the install link
    pub fn show_screen_share(&mut self, available: bool) {
        self.share_screen.visible = available;
        self.install_button.visible = !available;
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::new()
    }
}
