use eframe::egui;
use tokio::sync::{mpsc, watch};

use super::source_picker::SourcePickerDialog;
use crate::session::{Command, PageSnapshot, SessionPhase};
use crate::view::{Button, MediaContainer};

const LEAVE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

pub struct QuickroomApp {
    snapshots: watch::Receiver<PageSnapshot>,
    commands: mpsc::Sender<Command>,
    source_picker: SourcePickerDialog,
    bug_details: String,
    runtime: tokio::runtime::Runtime,
}

impl QuickroomApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        runtime: tokio::runtime::Runtime,
        snapshots: watch::Receiver<PageSnapshot>,
        commands: mpsc::Sender<Command>,
        source_picker: SourcePickerDialog,
    ) -> Self {
        let mut style = (*cc.egui_ctx.style()).clone();
        style.spacing.item_spacing = egui::vec2(8.0, 8.0);
        cc.egui_ctx.set_style(style);

        Self {
            snapshots,
            commands,
            source_picker,
            bug_details: String::new(),
            runtime,
        }
    }

    fn button(ui: &mut egui::Ui, commands: &mpsc::Sender<Command>, button: &Button, command: Command) {
        if !button.visible {
            return;
        }
        if ui
            .add_enabled(!button.disabled, egui::Button::new(&button.label))
            .clicked()
        {
            send(commands, command);
        }
    }

    fn show_container(ui: &mut egui::Ui, title: &str, container: &MediaContainer) {
        ui.label(egui::RichText::new(title).strong());
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            if container.is_empty() {
                ui.label(egui::RichText::new("No media").weak());
            }
            for element in container.elements() {
                ui.horizontal(|ui| {
                    let icon = if element.screen_share {
                        "🖥"
                    } else {
                        match element.kind {
                            quickroom_protocol::TrackKind::Audio => "🎤",
                            quickroom_protocol::TrackKind::Video => "📹",
                        }
                    };
                    ui.label(icon);
                    ui.label(&element.label);
                    if let Some(owner) = &element.owner {
                        ui.label(egui::RichText::new(owner).small().weak());
                    }
                });
            }
        });
    }
}

fn send(commands: &mpsc::Sender<Command>, command: Command) {
    if let Err(e) = commands.try_send(command) {
        tracing::warn!("Dropped UI command: {}", e);
    }
}

impl eframe::App for QuickroomApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // coordinator updates arrive from another thread
        ctx.request_repaint_after(std::time::Duration::from_millis(100));

        if ctx.input(|i| i.viewport().close_requested()) {
            tracing::info!("Window closing; leaving room");
            send(&self.commands, Command::Leave);
            // give the coordinator a moment to disconnect before the runtime goes away
            let mut snapshots = self.snapshots.clone();
            self.runtime.block_on(async move {
                let left = tokio::time::timeout(
                    LEAVE_TIMEOUT,
                    snapshots.wait_for(|s| s.phase != SessionPhase::Joined),
                )
                .await
                .is_ok();
                if !left {
                    tracing::warn!("Timed out waiting to leave the room");
                }
            });
        }

        let snapshot = self.snapshots.borrow_and_update().clone();
        let controls = &snapshot.page.controls;

        egui::TopBottomPanel::top("room_header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let title = match (&snapshot.phase, &snapshot.room_name) {
                    (SessionPhase::Joined, Some(room)) => format!("Room: {}", room),
                    (SessionPhase::Joining, _) => "Joining...".to_string(),
                    (SessionPhase::Left, _) => "Left the room".to_string(),
                    _ => "Preview".to_string(),
                };
                ui.heading(title);
                if let Some(identity) = &snapshot.identity {
                    ui.label(egui::RichText::new(format!("as {}", identity)).weak());
                }
            });
        });

        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                Self::button(ui, &self.commands, &controls.mute_audio, Command::ToggleMute);
                Self::button(ui, &self.commands, &controls.disable_video, Command::ToggleVideo);
                Self::button(ui, &self.commands, &controls.share_screen, Command::ToggleScreenShare);
                if controls.install_button.visible {
                    ui.label(
                        egui::RichText::new("Install the screen-share extension to share your screen")
                            .small()
                            .weak(),
                    );
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    Self::button(ui, &self.commands, &controls.report_bug, Command::OpenBugReport);
                    if controls.send_report.visible
                        && ui
                            .add_enabled(!controls.send_report.disabled, egui::Button::new(&controls.send_report.label))
                            .clicked()
                    {
                        send(&self.commands, Command::EditBugDetails(std::mem::take(&mut self.bug_details)));
                        send(&self.commands, Command::SendReport);
                    }
                    if controls.bug_details.visible {
                        ui.add(
                            egui::TextEdit::singleline(&mut self.bug_details)
                                .hint_text("What went wrong?")
                                .desired_width(240.0),
                        );
                    }
                });
            });
            ui.add_space(4.0);
        });

        egui::SidePanel::right("participants")
            .default_width(180.0)
            .show(ctx, |ui| {
                ui.label(egui::RichText::new("Participants").strong());
                if snapshot.participants.is_empty() {
                    ui.label(egui::RichText::new("Nobody else is here").weak());
                }
                for identity in &snapshot.participants {
                    ui.label(identity);
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                Self::show_container(ui, "You", &snapshot.page.local_media);
                ui.add_space(12.0);
                Self::show_container(ui, "Others", &snapshot.page.remote_media);
            });
        });

        self.source_picker.show(ctx);
    }
}
