use std::path::PathBuf;

use anyhow::{Context, Result};
use heapvis_core::options::Options;
use heapvis_ui::HeapvisApp;

/// Environment variable naming a JSON options file.
const OPTIONS_ENV: &str = "HEAPVIS_OPTIONS";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let options_path = std::env::var_os(OPTIONS_ENV).map(PathBuf::from);
    let options = match &options_path {
        Some(path) => {
            Options::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Options::default(),
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("heapvis")
            .with_inner_size([1200.0, 800.0]),
        ..Default::default()
    };
    eframe::run_native(
        "heapvis",
        native_options,
        Box::new(move |cc| Ok(Box::new(HeapvisApp::new(cc, options, options_path)))),
    )
    .map_err(|e| anyhow::anyhow!("failed to start heapvis: {e}"))
}
