use csv_pager::format::{format_count, format_date, format_file_size, format_percent};
use csv_pager::models::{FileId, FileStatus, UploadedFile};
use csv_pager::session::Session;
use eframe::egui;
use std::sync::Arc;
use tokio::runtime::Runtime;

enum FileAction {
    Select(UploadedFile),
    Delete(FileId),
}

pub struct FilesPanel {
    session: Arc<Session>,
    runtime: Arc<Runtime>,
}

impl FilesPanel {
    pub fn new(session: Arc<Session>, runtime: Arc<Runtime>) -> Self {
        Self { session, runtime }
    }

    pub fn show(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.heading("Uploaded Files");

        let snapshot = self.session.files();
        let selected_id = self
            .session
            .with_viewer(|v| v.selected().map(|f| f.file_id.clone()));

        if !snapshot.loaded {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading files...");
            });
            return;
        }

        if snapshot.files.is_empty() {
            ui.label("No files uploaded yet.");
            return;
        }

        let mut actions = Vec::new();

        egui::ScrollArea::vertical()
            .id_salt("files_scroll")
            .show(ui, |ui| {
                for file in &snapshot.files {
                    let is_selected = selected_id.as_ref() == Some(&file.file_id);
                    ui.group(|ui| {
                        ui.horizontal(|ui| {
                            if ui.selectable_label(is_selected, &file.filename).clicked() {
                                actions.push(FileAction::Select(file.clone()));
                            }
                            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                if ui.small_button("×").on_hover_text("Delete").clicked() {
                                    actions.push(FileAction::Delete(file.file_id.clone()));
                                }
                            });
                        });

                        ui.label(format!("Size: {}", format_file_size(file.file_size)));
                        ui.horizontal(|ui| {
                            ui.label("Status:");
                            ui.colored_label(status_color(file.status), file.status.as_str());
                        });
                        if let Some(rows) = file.total_rows {
                            ui.label(format!("Rows: {}", format_count(rows)));
                        }
                        if file.status == FileStatus::Processing {
                            ui.add(
                                egui::ProgressBar::new(file.progress_fraction())
                                    .text(format_percent(file.processing_progress)),
                            );
                        }
                        if let Some(message) = &file.error_message {
                            ui.colored_label(egui::Color32::RED, message);
                        }
                        ui.label(format!("Uploaded: {}", format_date(&file.created_at)));
                    });
                }
            });

        for action in actions {
            match action {
                FileAction::Select(file) => self.select(file, ctx),
                FileAction::Delete(id) => self.delete(id, ctx),
            }
        }
    }

    fn select(&self, file: UploadedFile, ctx: &egui::Context) {
        let session = self.session.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            // errors land in the session's error banner
            let _ = session.select_file(file).await;
            ctx.request_repaint();
        });
    }

    fn delete(&self, id: FileId, ctx: &egui::Context) {
        let session = self.session.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let _ = session.delete_file(&id).await;
            ctx.request_repaint();
        });
    }
}

fn status_color(status: FileStatus) -> egui::Color32 {
    match status {
        FileStatus::Completed => egui::Color32::GREEN,
        FileStatus::Failed => egui::Color32::RED,
        FileStatus::Processing => egui::Color32::from_rgb(255, 165, 0),
        FileStatus::Uploading => egui::Color32::LIGHT_BLUE,
    }
}
