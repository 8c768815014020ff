//! Dialog for choosing which screen or window to share
//!
//! The coordinator runs on the Tokio runtime while egui owns the main
//! thread, so a pick is a request/reply pair: `EguiSourcePicker` sends the
//! sources over a channel and awaits the answer that `SourcePickerDialog`
//! produces once the user clicks Share or Cancel.

use async_trait::async_trait;
use egui::{Color32, RichText, Vec2};
use quickroom_protocol::CaptureSourceType;
use tokio::sync::{mpsc, oneshot};

use crate::media::{CaptureSource, SourcePicker};

pub struct PickRequest {
    pub sources: Vec<CaptureSource>,
    pub reply: oneshot::Sender<Option<String>>,
}

/// `SourcePicker` half that lives with the coordinator
pub struct EguiSourcePicker {
    requests: mpsc::UnboundedSender<PickRequest>,
}

impl EguiSourcePicker {
    /// Create the picker and the dialog that answers it
    pub fn new() -> (Self, SourcePickerDialog) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Self { requests }, SourcePickerDialog::new(rx))
    }
}

#[async_trait]
impl SourcePicker for EguiSourcePicker {
    async fn pick(&self, sources: Vec<CaptureSource>) -> Option<String> {
        let (reply, answer) = oneshot::channel();
        if self.requests.send(PickRequest { sources, reply }).is_err() {
            tracing::warn!("Source picker window is gone");
            return None;
        }
        // a dropped dialog counts as a cancel
        answer.await.ok().flatten()
    }
}

pub struct SourcePickerDialog {
    requests: mpsc::UnboundedReceiver<PickRequest>,
    pending: Option<PickRequest>,
    selected: Option<usize>,
}

impl SourcePickerDialog {
    fn new(requests: mpsc::UnboundedReceiver<PickRequest>) -> Self {
        Self {
            requests,
            pending: None,
            selected: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    /// Pick up a new request if none is showing
    pub fn poll(&mut self) {
        if self.pending.is_some() {
            return;
        }
        if let Ok(request) = self.requests.try_recv() {
            self.selected = if request.sources.is_empty() { None } else { Some(0) };
            self.pending = Some(request);
        }
    }

    /// Answer the open request and close the dialog
    pub fn answer(&mut self, choice: Option<String>) {
        if let Some(request) = self.pending.take() {
            let _ = request.reply.send(choice);
        }
        self.selected = None;
    }

    pub fn select(&mut self, index: usize) {
        if let Some(request) = &self.pending {
            if index < request.sources.len() {
                self.selected = Some(index);
            }
        }
    }

    fn selected_id(&self) -> Option<String> {
        let request = self.pending.as_ref()?;
        self.selected
            .and_then(|i| request.sources.get(i))
            .map(|s| s.id.clone())
    }

    pub fn show(&mut self, ctx: &egui::Context) {
        self.poll();
        let Some(request) = &self.pending else {
            return;
        };

        let mut clicked = None;
        let mut share = false;
        let mut cancel = false;

        egui::Window::new("Select what to share")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
            .fixed_size(Vec2::new(420.0, 320.0))
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().max_height(240.0).show(ui, |ui| {
                    if request.sources.is_empty() {
                        ui.label("No screens or windows found");
                    }
                    for (index, source) in request.sources.iter().enumerate() {
                        let kind = match source.source_type {
                            CaptureSourceType::Screen => "Screen",
                            CaptureSourceType::Window => "Window",
                            CaptureSourceType::Tab => "Tab",
                        };
                        let is_selected = self.selected == Some(index);
                        let text = RichText::new(format!("{}  ({})", source.name, kind));
                        let text = if is_selected {
                            text.color(Color32::from_rgb(100, 150, 255))
                        } else {
                            text
                        };
                        if ui.selectable_label(is_selected, text).clicked() {
                            clicked = Some(index);
                        }
                    }
                });

                ui.separator();
                ui.horizontal(|ui| {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui
                            .add_enabled(self.selected.is_some(), egui::Button::new("Share"))
                            .clicked()
                        {
                            share = true;
                        }
                        if ui.button("Cancel").clicked() {
                            cancel = true;
                        }
                    });
                });
            });

        if let Some(index) = clicked {
            self.select(index);
        }
        if share {
            let choice = self.selected_id();
            self.answer(choice);
        } else if cancel {
            self.answer(None);
        }
    }
}
