use crate::domain::error::SessionError;
use std::fmt;

/// A position in joystick-pad coordinates (origin at the pad's top-left corner,
/// y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Offset produced by the joystick and consumed by the command encoder.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplacementVector {
    pub dx: f64,
    pub dy: f64,
}

impl DisplacementVector {
    pub const ZERO: Self = Self { dx: 0.0, dy: 0.0 };

    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }
}

/// Transport-level identifier of a peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredDevice {
    pub id: PeerId,
    pub name: String,
    pub signal_strength: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Scanning,
    Connecting,
    /// Connected, joystick commands are streamed.
    Ready,
    /// Connected, the robot is in setup mode and accepts tuning commands.
    Tuning,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Tuning => "tuning",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    PoweredOn,
    PoweredOff,
    #[default]
    Unknown,
}

/// Everything the UI needs to render the session.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub power: PowerState,
    pub link_ready: bool,
    pub devices: Vec<DiscoveredDevice>,
    pub selected: Option<PeerId>,
    pub scan_settled: bool,
    pub rescan_available: bool,
    pub picker_open: bool,
    pub connecting: bool,
    pub console: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JoystickView {
    pub active: bool,
    pub handle_center: Point,
    pub displacement: DisplacementVector,
}

/// Events published by the session worker to its single subscriber.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Snapshot(SessionSnapshot),
    Joystick(JoystickView),
    Alert(SessionError),
    LogMessage(StatusMessage),
}

/// Requests sent from the UI to the session worker.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    StartScan,
    Rescan,
    CancelPicker,
    SelectDevice(PeerId),
    Disconnect,
    ToggleTuning,
    SubmitTuning { parameter: String, raw: String },
    SaveTuning,
    TouchBegin(Point),
    TouchMove(Point),
    TouchEnd,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>, severity: MessageSeverity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
