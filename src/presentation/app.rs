use crate::domain::error::SessionError;
use crate::domain::joystick::JoystickGeometry;
use crate::domain::models::{
    AppEvent, JoystickView, MessageSeverity, PowerState, SessionCommand, SessionSnapshot,
    SessionState, StatusMessage,
};
use crate::domain::settings::SettingsService;
use crate::domain::tuning::TuningParameter;
use crate::infrastructure::logging::{init_logger, LoggingGuard};
use crate::infrastructure::worker::{spawn_session_worker, SessionHandle};
use crate::presentation::components::Components;
use crate::presentation::panels;
use crate::presentation::theme::{configure_style, RemotePalette};
use eframe::egui;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

pub struct RobotRemoteApp {
    // Session worker
    pub(crate) session: SessionHandle,
    pub(crate) events_rx: mpsc::UnboundedReceiver<AppEvent>,

    // Latest state published by the worker
    pub(crate) snapshot: SessionSnapshot,
    pub(crate) joystick: JoystickView,
    pub(crate) geometry: JoystickGeometry,
    pub(crate) alerts: VecDeque<SessionError>,
    pub(crate) status_message: Option<StatusMessage>,

    // UI state
    pub(crate) tuning_inputs: [String; TuningParameter::ALL.len()],
    pub(crate) pad_tracking: bool,
    pub(crate) is_dark_mode: bool,

    // Dropped last so the worker's shutdown still gets logged
    pub(crate) _logging_guard: Option<LoggingGuard>,
}

impl RobotRemoteApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> anyhow::Result<Self> {
        configure_style(&cc.egui_ctx, false);

        let settings_service = SettingsService::new()?;
        let settings = settings_service.get().clone();

        let logging_guard = init_logger(&settings.log_settings)
            .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
            .ok();

        info!("Starting Robot Remote ({:?} link)", settings.link_backend);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = spawn_session_worker(settings.clone(), events_tx)?;

        Ok(Self {
            session,
            events_rx,
            snapshot: SessionSnapshot::default(),
            joystick: JoystickView::default(),
            geometry: JoystickGeometry::square(
                settings.joystick_background_size,
                settings.joystick_handle_size,
            ),
            alerts: VecDeque::new(),
            status_message: None,
            tuning_inputs: Default::default(),
            pad_tracking: false,
            is_dark_mode: false,
            _logging_guard: logging_guard,
        })
    }

    pub(crate) fn send(&self, command: SessionCommand) {
        self.session.send(command);
    }

    fn pump_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                AppEvent::Snapshot(snapshot) => self.snapshot = snapshot,
                AppEvent::Joystick(view) => self.joystick = view,
                AppEvent::Alert(error) => {
                    // The same failure reported twice in a row is shown once.
                    if self.alerts.back() != Some(&error) {
                        self.alerts.push_back(error);
                    }
                }
                AppEvent::LogMessage(msg) => self.status_message = Some(msg),
            }
        }
    }

    fn ui_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.heading("Robot Remote");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let switch_icon = if self.is_dark_mode { "☀ Light" } else { "🌙 Dark" };
                    if ui.button(switch_icon).clicked() {
                        self.is_dark_mode = !self.is_dark_mode;
                        configure_style(ctx, self.is_dark_mode);
                    }

                    match self.snapshot.state {
                        SessionState::Idle | SessionState::Scanning => {
                            if ui.button("Connect").clicked() {
                                self.send(SessionCommand::StartScan);
                            }
                        }
                        SessionState::Connecting => {
                            ui.spinner();
                            ui.label("Connecting...");
                        }
                        SessionState::Ready | SessionState::Tuning => {
                            if ui.button("Disconnect").clicked() {
                                self.send(SessionCommand::Disconnect);
                            }
                        }
                    }
                });
            });
        });
    }

    fn ui_status_banner(&self, ui: &mut egui::Ui) {
        let palette = RemotePalette::new(self.is_dark_mode);
        let (text, bg_color) = if self.snapshot.link_ready {
            ("READY", palette.ready)
        } else {
            match self.snapshot.power {
                PowerState::PoweredOn => (
                    match self.snapshot.state {
                        SessionState::Scanning => "SCANNING",
                        SessionState::Connecting => "CONNECTING",
                        _ => "BLUETOOTH ON",
                    },
                    palette.powered,
                ),
                PowerState::PoweredOff | PowerState::Unknown => {
                    ("BLUETOOTH UNAVAILABLE", palette.unavailable)
                }
            }
        };
        Components::status_banner(ui, text, bg_color, egui::Color32::BLACK);

        if let Some(msg) = &self.status_message {
            let color = match msg.severity {
                MessageSeverity::Info => ui.visuals().text_color(),
                MessageSeverity::Success => palette.ready,
                MessageSeverity::Warning => palette.powered,
                MessageSeverity::Error => palette.unavailable,
            };
            ui.label(egui::RichText::new(&msg.message).color(color));
        }
    }

    /// Always clickable; without a ready link the session answers with an alert.
    fn ui_mode_toggle(&self, ui: &mut egui::Ui) {
        if ui.button(mode_toggle_label(self.snapshot.state)).clicked() {
            self.send(SessionCommand::ToggleTuning);
        }
    }

    fn ui_alert(&mut self, ctx: &egui::Context) {
        let Some(error) = self.alerts.front() else {
            return;
        };

        let mut acknowledged = false;
        egui::Window::new(error.title())
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(error.to_string());
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    acknowledged = true;
                }
            });

        if acknowledged {
            self.alerts.pop_front();
        }
    }
}

fn mode_toggle_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Tuning => "Run Mode",
        _ => "Adjust Settings",
    }
}

impl eframe::App for RobotRemoteApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.pump_events();
        ctx.request_repaint_after(Duration::from_millis(50));

        self.ui_top_bar(ctx);

        egui::TopBottomPanel::bottom("console_panel")
            .resizable(true)
            .default_height(160.0)
            .show(ctx, |ui| panels::console::render(self, ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            self.ui_status_banner(ui);
            ui.add_space(8.0);
            self.ui_mode_toggle(ui);
            ui.separator();

            if self.snapshot.state == SessionState::Tuning {
                panels::tuning::render(self, ui);
            } else {
                panels::control::render(self, ui);
            }
        });

        if self.snapshot.picker_open {
            panels::devices::render(self, ctx);
        }
        self.ui_alert(ctx);
    }
}
