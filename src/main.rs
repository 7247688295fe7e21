mod domain;
mod infrastructure;
mod presentation;

use eframe::egui;
use presentation::app::RobotRemoteApp;

type AppResult = Result<Box<dyn eframe::App>, Box<dyn std::error::Error + Send + Sync>>;

fn create_app(cc: &eframe::CreationContext<'_>) -> AppResult {
    Ok(Box::new(RobotRemoteApp::new(cc)?))
}

fn main() -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([520.0, 760.0])
            .with_title("Robot Remote"),
        ..Default::default()
    };

    eframe::run_native("Robot Remote", options, Box::new(|cc| create_app(cc)))
        .map_err(|e| anyhow::anyhow!("{}", e))
}
