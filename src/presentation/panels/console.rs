use crate::presentation::app::RobotRemoteApp;
use eframe::egui;

pub fn render(app: &mut RobotRemoteApp, ui: &mut egui::Ui) {
    ui.label(egui::RichText::new("Robot output").strong());
    egui::ScrollArea::vertical()
        .id_salt("console")
        .stick_to_bottom(true)
        .auto_shrink([false, false])
        .show(ui, |ui| {
            ui.add(
                egui::Label::new(egui::RichText::new(&app.snapshot.console).monospace())
                    .wrap(),
            );
        });
}
