use crate::domain::models::{Point, SessionCommand, SessionState};
use crate::presentation::app::RobotRemoteApp;
use crate::presentation::theme::RemotePalette;
use eframe::egui;

/// Seconds the handle takes to glide back to center after release.
const RETURN_ANIMATION_SECS: f32 = 0.2;
const FOLLOW_ANIMATION_SECS: f32 = 0.03;

pub fn render(app: &mut RobotRemoteApp, ui: &mut egui::Ui) {
    ui.vertical_centered(|ui| {
        if app.snapshot.state != SessionState::Ready {
            ui.label("Connect to a robot to drive.");
        }

        let size = app.geometry.background_height as f32;
        let (rect, response) =
            ui.allocate_exact_size(egui::vec2(size, size), egui::Sense::drag());
        let to_pad = |pos: egui::Pos2| {
            Point::new((pos.x - rect.min.x) as f64, (pos.y - rect.min.y) as f64)
        };

        if response.drag_started() {
            let origin = ui
                .input(|i| i.pointer.press_origin())
                .or(response.interact_pointer_pos());
            if let Some(pos) = origin {
                app.pad_tracking = true;
                app.send(SessionCommand::TouchBegin(to_pad(pos)));
            }
        }
        if app.pad_tracking && response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                app.send(SessionCommand::TouchMove(to_pad(pos)));
            }
        }
        if app.pad_tracking && response.drag_stopped() {
            app.pad_tracking = false;
            app.send(SessionCommand::TouchEnd);
        }

        let palette = RemotePalette::new(app.is_dark_mode);
        let painter = ui.painter_at(rect);
        painter.circle_filled(rect.center(), size / 2.0, palette.pad_background);
        painter.circle_stroke(
            rect.center(),
            app.geometry.radius() as f32,
            egui::Stroke::new(1.0, palette.stroke),
        );

        let target = if app.joystick.active {
            app.joystick.handle_center
        } else {
            app.geometry.background_center
        };
        let glide = if app.joystick.active {
            FOLLOW_ANIMATION_SECS
        } else {
            RETURN_ANIMATION_SECS
        };
        let ctx = ui.ctx();
        let handle_x = ctx.animate_value_with_time(response.id.with("handle_x"), target.x as f32, glide);
        let handle_y = ctx.animate_value_with_time(response.id.with("handle_y"), target.y as f32, glide);
        painter.circle(
            rect.min + egui::vec2(handle_x, handle_y),
            app.geometry.handle_size as f32 / 2.0,
            palette.pad_handle,
            egui::Stroke::new(2.0, palette.stroke),
        );

        let d = app.joystick.displacement;
        ui.label(
            egui::RichText::new(format!("dx {:+6.1}   dy {:+6.1}", d.dx, d.dy)).monospace(),
        );
    });
}
