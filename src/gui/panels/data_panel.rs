use csv_pager::config::PAGE_SIZE_OPTIONS;
use csv_pager::models::PagedResult;
use csv_pager::session::Session;
use csv_pager::viewer::{cell_text, DataViewer, ViewerDisplay};
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use std::sync::Arc;
use tokio::runtime::Runtime;

const ROW_HEIGHT: f32 = 18.0;

enum PageAction {
    Previous,
    Next,
    PageSize(u32),
}

pub struct DataPanel {
    session: Arc<Session>,
    runtime: Arc<Runtime>,
}

impl DataPanel {
    pub fn new(session: Arc<Session>, runtime: Arc<Runtime>) -> Self {
        Self { session, runtime }
    }

    pub fn show(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        // Drawn under the viewer lock; anything that fetches runs afterwards.
        let action = self.session.with_viewer(|viewer| draw(ui, viewer));

        if let Some(action) = action {
            self.dispatch(action, ctx);
        }
    }

    fn dispatch(&self, action: PageAction, ctx: &egui::Context) {
        let session = self.session.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let _ = match action {
                PageAction::Previous => session.previous_page().await,
                PageAction::Next => session.next_page().await,
                PageAction::PageSize(size) => session.set_page_size(size).await,
            };
            ctx.request_repaint();
        });
    }
}

fn draw(ui: &mut egui::Ui, viewer: &DataViewer) -> Option<PageAction> {
    let page = match viewer.display() {
        ViewerDisplay::Page(page) => page,
        other => {
            ui.heading("Data Viewer");
            if matches!(other, ViewerDisplay::Loading) {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(other.placeholder().unwrap_or_default());
                });
            } else {
                ui.label(other.placeholder().unwrap_or_default());
            }
            return None;
        }
    };

    let filename = viewer.selected().map(|f| f.filename.as_str()).unwrap_or("");
    let loading = viewer.is_loading();
    let mut action = None;

    ui.heading(format!("Data Viewer - {}", filename));

    ui.horizontal(|ui| {
        ui.label(page.range_label());
        if loading {
            ui.spinner();
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let mut chosen = viewer.page_size();
            ui.add_enabled_ui(!loading, |ui| {
                egui::ComboBox::from_label("Rows per page")
                    .selected_text(chosen.to_string())
                    .show_ui(ui, |ui| {
                        for size in PAGE_SIZE_OPTIONS {
                            ui.selectable_value(&mut chosen, size, size.to_string());
                        }
                    });
            });
            if chosen != viewer.page_size() {
                action = Some(PageAction::PageSize(chosen));
            }
        });
    });

    ui.separator();

    let table_height = (ui.available_height() - 40.0).max(100.0);
    ui.push_id(("page_table", page.page, page.page_size), |ui| {
        draw_table(ui, page, table_height);
    });

    ui.separator();

    ui.horizontal(|ui| {
        if ui
            .add_enabled(page.has_previous && !loading, egui::Button::new("◀ Previous"))
            .clicked()
        {
            action = Some(PageAction::Previous);
        }
        ui.label(page.page_label());
        if ui
            .add_enabled(page.has_next && !loading, egui::Button::new("Next ▶"))
            .clicked()
        {
            action = Some(PageAction::Next);
        }
    });

    action
}

fn draw_table(ui: &mut egui::Ui, page: &PagedResult, max_height: f32) {
    egui::ScrollArea::horizontal().show(ui, |ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .max_scroll_height(max_height)
            .columns(Column::auto().at_least(80.0).clip(true), page.columns.len())
            .header(ROW_HEIGHT + 4.0, |mut header| {
                for column in &page.columns {
                    header.col(|ui| {
                        ui.strong(column);
                    });
                }
            })
            .body(|body| {
                body.rows(ROW_HEIGHT, page.data.len(), |mut row| {
                    let record = &page.data[row.index()];
                    for column in &page.columns {
                        row.col(|ui| {
                            ui.label(cell_text(record.get(column)));
                        });
                    }
                });
            });
    });
}
