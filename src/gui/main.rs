mod app;
mod panels;

use anyhow::{anyhow, Context, Result};
use csv_pager::config::Config;
use eframe::egui;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::load_default()?;
    let runtime = Arc::new(Runtime::new().context("Failed to create Tokio runtime")?);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([900.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "CSV Pager",
        options,
        Box::new(move |cc| Ok(Box::new(app::CsvPagerApp::new(cc, &config, runtime)?))),
    )
    .map_err(|e| anyhow!("GUI failed: {}", e))
}
