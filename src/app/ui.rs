use super::DocsUploader;
use crate::upload::{NotificationKind, Session};
use crate::utils::file_size::format_size;
use eframe::egui::{self, Align, Color32, RichText};

const ACCENT: Color32 = Color32::from_rgb(220, 60, 60);
const SUCCESS: Color32 = Color32::from_rgb(0, 160, 70);
const FAILURE: Color32 = Color32::from_rgb(220, 50, 50);

/// What the user clicked during this frame; applied after drawing.
#[derive(Default)]
struct Intents {
    pick_file: bool,
    remove_pending: bool,
    submit: bool,
    download: Option<String>,
    clear_completed: bool,
}

impl DocsUploader {
    pub fn render(&mut self, ctx: &egui::Context) {
        let mut intents = Intents::default();

        egui::CentralPanel::default().show(ctx, |ui| {
            let footer_height = 30.0;
            let content_height = ui.available_height() - footer_height;

            egui::ScrollArea::vertical()
                .max_height(content_height)
                .show(ui, |ui| {
                    ui.add_space(20.0);
                    ui.vertical_centered(|ui| {
                        ui.heading("Generate Documentation");
                        ui.add_space(5.0);
                        ui.label(
                            RichText::new("Upload a ZIP of your source code and download the generated docs")
                                .color(ui.visuals().text_color().gamma_multiply(0.7)),
                        );
                    });

                    ui.add_space(20.0);
                    self.render_drop_zone(ui, &mut intents);

                    ui.add_space(15.0);
                    self.render_notification(ui);

                    if !self.manager.state().sessions.is_empty() {
                        ui.add_space(15.0);
                        self.render_sessions(ui);
                    }

                    if !self.manager.state().completed.is_empty() {
                        ui.add_space(15.0);
                        self.render_completed(ui, &mut intents);
                    }

                    ui.add_space(20.0);
                });

            ui.with_layout(egui::Layout::bottom_up(Align::Center), |ui| {
                ui.add_space(5.0);
                self.render_footer(ui);
            });
        });

        self.apply_intents(intents);
    }

    fn apply_intents(&mut self, intents: Intents) {
        if intents.pick_file {
            self.pick_file();
        }
        if intents.remove_pending {
            self.manager.remove_pending();
        }
        if intents.submit {
            self.manager.submit();
        }
        if let Some(token) = intents.download {
            self.manager.download(&token);
        }
        if intents.clear_completed {
            self.manager.clear_completed();
        }
    }

    fn render_drop_zone(&self, ui: &mut egui::Ui, intents: &mut Intents) {
        let state = self.manager.state();
        let (fill, stroke) = if state.is_dragging {
            (ACCENT.gamma_multiply(0.15), ACCENT)
        } else {
            (
                ui.visuals().extreme_bg_color,
                ui.visuals().widgets.noninteractive.bg_stroke.color,
            )
        };

        egui::Frame::none()
            .fill(fill)
            .stroke(egui::Stroke::new(2.0, stroke))
            .rounding(12.0)
            .inner_margin(24.0)
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.vertical_centered(|ui| {
                    let button = egui::Button::new("📁 Choose ZIP").min_size(egui::vec2(160.0, 36.0));
                    if ui.add(button).clicked() {
                        intents.pick_file = true;
                    }
                    ui.add_space(6.0);
                    ui.label(if state.is_dragging {
                        "Release to select"
                    } else {
                        "or drop a .zip file here"
                    });

                    if let Some(pending) = &state.pending {
                        ui.add_space(12.0);
                        ui.horizontal(|ui| {
                            ui.label("📦");
                            ui.strong(&pending.name);
                            if let Some(size) = pending.size {
                                ui.label(
                                    RichText::new(format_size(size))
                                        .color(ui.visuals().text_color().gamma_multiply(0.6)),
                                );
                            }
                            if ui.small_button("✖").on_hover_text("Remove").clicked() {
                                intents.remove_pending = true;
                            }
                        });
                    }
                });
            });

        ui.add_space(12.0);
        ui.vertical_centered(|ui| {
            let label = if state.is_uploading() {
                "⏳ Uploading..."
            } else {
                "Generate Documentation"
            };
            let button = egui::Button::new(label).min_size(egui::vec2(220.0, 40.0));
            if ui.add_enabled(state.pending.is_some(), button).clicked() {
                intents.submit = true;
            }
        });
    }

    fn render_notification(&self, ui: &mut egui::Ui) {
        let Some(notification) = &self.manager.state().notification else {
            return;
        };
        let (icon, color) = match notification.kind {
            NotificationKind::Info => ("⏳", ui.visuals().text_color()),
            NotificationKind::Success => ("✅", SUCCESS),
            NotificationKind::Failure => ("❌", FAILURE),
        };
        egui::Frame::none()
            .fill(color.gamma_multiply(0.08))
            .stroke(egui::Stroke::new(1.0, color.gamma_multiply(0.5)))
            .rounding(6.0)
            .inner_margin(10.0)
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.horizontal_wrapped(|ui| {
                    ui.label(icon);
                    ui.colored_label(color, &notification.message);
                });
            });
    }

    fn render_sessions(&self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.set_width(ui.available_width());
            ui.label(RichText::new("In progress").strong());
            ui.add_space(6.0);
            for session in &self.manager.state().sessions {
                render_session(ui, session);
                ui.add_space(6.0);
            }
        });
    }

    fn render_completed(&self, ui: &mut egui::Ui, intents: &mut Intents) {
        ui.group(|ui| {
            ui.set_width(ui.available_width());
            ui.horizontal(|ui| {
                ui.label(RichText::new("Ready to download").strong());
                ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                    if ui.button("🗑 Clear").clicked() {
                        intents.clear_completed = true;
                    }
                });
            });
            ui.add_space(6.0);
            for done in &self.manager.state().completed {
                ui.horizontal(|ui| {
                    ui.colored_label(SUCCESS, "✅");
                    ui.label(&done.name);
                    if ui
                        .button("⬇ Download")
                        .on_hover_text(format!("Save as {}.zip", done.download_token))
                        .clicked()
                    {
                        intents.download = Some(done.download_token.clone());
                    }
                });
            }
        });
    }

    fn render_footer(&self, ui: &mut egui::Ui) {
        ui.label(
            RichText::new(format!(
                "Backend: {}  •  Saving to {}",
                self.api_base_url,
                self.manager.download_dir().display()
            ))
            .small()
            .color(ui.visuals().text_color().gamma_multiply(0.6)),
        );
    }
}

fn render_session(ui: &mut egui::Ui, session: &Session) {
    ui.horizontal(|ui| {
        ui.spinner();
        ui.label(&session.filename);
        ui.label(
            RichText::new(session.status.to_string())
                .color(ui.visuals().text_color().gamma_multiply(0.6)),
        );
    });

    match &session.progress {
        Some(progress) => {
            ui.add(
                egui::ProgressBar::new(progress.fraction())
                    .text(format!("{}%", progress.percentage))
                    .fill(ACCENT),
            );
            ui.small(format!(
                "{}/{} files · {}",
                progress.current, progress.total, progress.current_file
            ));
        }
        None => {
            ui.add(egui::ProgressBar::new(0.0).animate(true));
        }
    }

    if let Some(error) = &session.error {
        ui.small(
            RichText::new(format!(
                "Retrying ({} failed checks): {}",
                session.consecutive_failures, error
            ))
            .color(FAILURE),
        );
    }
}
