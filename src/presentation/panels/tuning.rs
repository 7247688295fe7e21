use crate::domain::models::SessionCommand;
use crate::domain::tuning::TuningParameter;
use crate::presentation::app::RobotRemoteApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut RobotRemoteApp, ui: &mut egui::Ui) {
    Components::card(ui, "Tuning", |ui| {
        egui::Grid::new("tuning_grid")
            .num_columns(2)
            .spacing([24.0, 8.0])
            .show(ui, |ui| {
                for (parameter, input) in TuningParameter::ALL.iter().zip(app.tuning_inputs.iter_mut()) {
                    ui.label(parameter.label());
                    let response = ui.add(
                        egui::TextEdit::singleline(input)
                            .hint_text(parameter.prefix())
                            .desired_width(120.0),
                    );

                    if response.lost_focus() {
                        if let Some(command) = take_submission(*parameter, input) {
                            app.session.send(command);
                        }
                    }
                    ui.end_row();
                }
            });

        ui.add_space(8.0);
        if ui.button("Save").clicked() {
            app.send(SessionCommand::SaveTuning);
        }
    });
}

/// Edits are applied when the field is left, then the field is cleared. The
/// text goes out exactly as typed; blank fields are skipped.
fn take_submission(parameter: TuningParameter, input: &mut String) -> Option<SessionCommand> {
    if input.trim().is_empty() {
        return None;
    }
    Some(SessionCommand::SubmitTuning {
        parameter: parameter.name().to_string(),
        raw: std::mem::take(input),
    })
}
