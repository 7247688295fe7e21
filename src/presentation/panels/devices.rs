use crate::domain::models::{SessionCommand, SessionState};
use crate::presentation::app::RobotRemoteApp;
use eframe::egui;

/// Device picker shown while scanning or connecting.
pub fn render(app: &mut RobotRemoteApp, ctx: &egui::Context) {
    let snapshot = &app.snapshot;
    let title = if snapshot.state == SessionState::Scanning && !snapshot.scan_settled {
        "Scanning"
    } else {
        "Devices"
    };

    let mut command = None;
    egui::Window::new(title)
        .id(egui::Id::new("device_picker"))
        .collapsible(false)
        .resizable(false)
        .default_width(320.0)
        .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
        .show(ctx, |ui| {
            if snapshot.devices.is_empty() {
                ui.label("No devices found yet.");
            }

            egui::ScrollArea::vertical()
                .id_salt("device_list")
                .max_height(220.0)
                .show(ui, |ui| {
                    for device in snapshot.devices.iter() {
                        let selected = snapshot.selected.as_ref() == Some(&device.id);
                        let text = format!("{}  ({} dBm)", device.name, device.signal_strength);
                        let button = ui.add_enabled(
                            !snapshot.connecting,
                            egui::SelectableLabel::new(selected, text),
                        );
                        if button.clicked() {
                            command = Some(SessionCommand::SelectDevice(device.id.clone()));
                        }
                    }
                });

            ui.separator();
            ui.horizontal(|ui| {
                if snapshot.connecting {
                    ui.spinner();
                    ui.label("Connecting...");
                } else if snapshot.rescan_available {
                    if ui.button("Rescan").clicked() {
                        command = Some(SessionCommand::Rescan);
                    }
                } else {
                    ui.spinner();
                }

                if ui.button("Cancel").clicked() {
                    command = Some(SessionCommand::CancelPicker);
                }
            });
        });

    if let Some(command) = command {
        app.send(command);
    }
}
