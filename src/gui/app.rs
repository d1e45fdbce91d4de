use super::panels::{DataPanel, FilesPanel, UploadPanel};
use anyhow::Result;
use csv_pager::api_client::{ApiClient, RemoteData};
use csv_pager::config::Config;
use csv_pager::disk::DiskSpaceView;
use csv_pager::session::Session;
use eframe::egui;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

const REPAINT_INTERVAL: Duration = Duration::from_millis(500);

pub struct CsvPagerApp {
    session: Arc<Session>,
    runtime: Arc<Runtime>,
    base_url: String,
    upload_panel: UploadPanel,
    files_panel: FilesPanel,
    data_panel: DataPanel,
}

impl CsvPagerApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: &Config,
        runtime: Arc<Runtime>,
    ) -> Result<Self> {
        let client = ApiClient::from_config(config)?;
        let base_url = client.base_url().to_string();
        let client: Arc<dyn RemoteData> = Arc::new(client);
        let session = Arc::new(Session::new(client, config));

        {
            let _guard = runtime.enter();
            session.start();
        }

        Ok(Self {
            session: session.clone(),
            runtime: runtime.clone(),
            base_url,
            upload_panel: UploadPanel::new(session.clone(), runtime.clone()),
            files_panel: FilesPanel::new(session.clone(), runtime.clone()),
            data_panel: DataPanel::new(session, runtime),
        })
    }

    fn show_disk_space(&self, ui: &mut egui::Ui) {
        let view = self.session.disk_space();
        match &view {
            DiskSpaceView::Unavailable => {
                ui.colored_label(egui::Color32::GRAY, view.label());
            }
            _ => {
                ui.label(view.label());
            }
        }
        if let Some(fraction) = view.usage_fraction() {
            let color = if fraction > 0.9 {
                egui::Color32::RED
            } else {
                egui::Color32::from_rgb(70, 130, 180)
            };
            ui.add(
                egui::ProgressBar::new(fraction)
                    .desired_width(120.0)
                    .fill(color),
            );
        }
    }
}

impl eframe::App for CsvPagerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // pollers update shared state in the background
        ctx.request_repaint_after(REPAINT_INTERVAL);

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("📊 CSV Pager");
                ui.separator();
                self.show_disk_space(ui);
            });

            if let Some(error) = self.session.error() {
                ui.horizontal(|ui| {
                    ui.colored_label(egui::Color32::RED, format!("Error: {}", error));
                    if ui.small_button("×").on_hover_text("Dismiss").clicked() {
                        self.session.dismiss_error();
                    }
                });
            }
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let snapshot = self.session.files();
                ui.label(format!("Service: {}", self.base_url));
                ui.separator();
                ui.label(format!(
                    "{} files ({} processing)",
                    snapshot.files.len(),
                    snapshot.processing_count()
                ));
                if let Some(at) = snapshot.last_refresh {
                    ui.separator();
                    ui.label(format!("Updated {}", at.format("%H:%M:%S")));
                }

                let failures = self.session.background_failures();
                if let Some(last) = failures.last() {
                    ui.separator();
                    ui.colored_label(
                        egui::Color32::YELLOW,
                        format!("⚠ {} refresh failed at {}", last.source, last.at.format("%H:%M:%S")),
                    )
                    .on_hover_text(&last.message);
                }
            });
        });

        egui::SidePanel::left("side_panel")
            .default_width(380.0)
            .show(ctx, |ui| {
                self.upload_panel.show(ui, ctx);
                ui.add_space(10.0);
                ui.separator();
                self.files_panel.show(ui, ctx);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.data_panel.show(ui, ctx);
        });
    }
}

impl Drop for CsvPagerApp {
    fn drop(&mut self) {
        let session = self.session.clone();
        self.runtime.block_on(async move { session.shutdown().await });
    }
}
