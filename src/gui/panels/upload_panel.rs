use csv_pager::format::format_file_size;
use csv_pager::models::{DataFrameInfo, UploadOutcome};
use csv_pager::session::{Session, UploadMode};
use csv_pager::viewer::table_rows;
use eframe::egui;
use std::sync::Arc;
use tokio::runtime::Runtime;

pub struct UploadPanel {
    session: Arc<Session>,
    runtime: Arc<Runtime>,
    mode: UploadMode,
}

impl UploadPanel {
    pub fn new(session: Arc<Session>, runtime: Arc<Runtime>) -> Self {
        Self {
            session,
            runtime,
            mode: UploadMode::Auto,
        }
    }

    pub fn show(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.heading("Upload CSV File");
        ui.label("Supports files up to 50GB with efficient memory usage");
        ui.add_space(5.0);

        let state = self.session.upload_state();

        ui.horizontal(|ui| {
            if ui
                .add_enabled(!state.uploading, egui::Button::new("📁 Browse..."))
                .clicked()
            {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("CSV", &["csv"])
                    .pick_file()
                {
                    // a bad path ends up in the error banner
                    let _ = self.session.choose_upload(&path);
                }
            }

            match &state.selected {
                Some(source) => {
                    ui.label(format!(
                        "{} ({})",
                        source.filename(),
                        format_file_size(source.len())
                    ));
                }
                None => {
                    ui.label("No file selected");
                }
            }
        });

        ui.horizontal(|ui| {
            ui.label("Endpoint:");
            ui.selectable_value(&mut self.mode, UploadMode::Auto, "Auto");
            ui.selectable_value(&mut self.mode, UploadMode::Small, "Small (parse now)");
            ui.selectable_value(&mut self.mode, UploadMode::Large, "Large (background)");
        });

        ui.add_space(5.0);

        if state.uploading {
            ui.add(egui::ProgressBar::new(state.progress / 100.0).show_percentage());
            ui.label(format!("Uploading... {:.0}%", state.progress));
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        } else {
            let can_upload = state.selected.is_some();
            if ui
                .add_enabled(can_upload, egui::Button::new("⬆️ Upload and Process"))
                .clicked()
            {
                self.start_upload(ctx);
            }
        }

        if let Some(error) = &state.error {
            ui.colored_label(egui::Color32::RED, format!("Upload failed: {}", error));
        }

        match &state.last_outcome {
            Some(UploadOutcome::Parsed(response)) => {
                ui.colored_label(
                    egui::Color32::GREEN,
                    format!("✓ Successfully processed: {}", response.filename),
                );
                show_dataframe_info(ui, &response.dataframe_info);
            }
            Some(UploadOutcome::Queued(ack)) => {
                let text = match &ack.file_id {
                    Some(id) => format!("✓ Upload accepted, processing as {}", id),
                    None => "✓ Upload accepted, processing in background".to_string(),
                };
                ui.colored_label(egui::Color32::GREEN, text);
            }
            None => {}
        }
    }

    fn start_upload(&self, ctx: &egui::Context) {
        let session = self.session.clone();
        let mode = self.mode;
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let _ = session.upload(mode).await;
            ctx.request_repaint();
        });
    }
}

fn show_dataframe_info(ui: &mut egui::Ui, info: &DataFrameInfo) {
    ui.collapsing("DataFrame Information", |ui| {
        ui.label(format!(
            "Shape: {} rows × {} columns",
            info.rows(),
            info.column_count()
        ));
        ui.label(format!("Memory Usage: {} KB", info.memory_usage_kb()));

        ui.add_space(5.0);
        egui::Grid::new("dtypes_grid")
            .striped(true)
            .num_columns(3)
            .show(ui, |ui| {
                ui.strong("Column");
                ui.strong("Type");
                ui.strong("Nulls");
                ui.end_row();

                for column in &info.columns {
                    ui.label(column);
                    ui.label(info.dtypes.get(column).map(String::as_str).unwrap_or("?"));
                    ui.label(
                        info.info
                            .null_counts
                            .get(column)
                            .copied()
                            .unwrap_or(0)
                            .to_string(),
                    );
                    ui.end_row();
                }
            });

        ui.add_space(5.0);
        ui.label("Sample Data");
        egui::ScrollArea::horizontal()
            .id_salt("sample_scroll")
            .show(ui, |ui| {
                egui::Grid::new("sample_grid")
                    .striped(true)
                    .num_columns(info.columns.len())
                    .show(ui, |ui| {
                        for column in &info.columns {
                            ui.strong(column);
                        }
                        ui.end_row();

                        for row in table_rows(&info.columns, &info.head) {
                            for cell in row {
                                ui.label(cell);
                            }
                            ui.end_row();
                        }
                    });
            });
    });
}
