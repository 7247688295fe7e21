//! Session controller
//!
//! Owns the connection lifecycle and everything that changes with it:
//!
//! ```text
//!   Idle ──start_scan──▶ Scanning ──select_device──▶ Connecting ──ready──▶ Ready ⇄ Tuning
//!    ▲                      │                           │                    │        │
//!    └──────────────────────┴─── disconnect / power loss / timeout / drop ───┴────────┘
//! ```
//!
//! The controller is driven from a single task: UI commands, link events,
//! timer expiries and the periodic tick all arrive as plain method calls, so no
//! locking is needed. After each mutation a [`SessionSnapshot`] goes to the
//! single subscriber.

use crate::domain::command::{CommandEncoder, ModeCommand};
use crate::domain::console::Scrollback;
use crate::domain::discovery::DeviceList;
use crate::domain::error::SessionError;
use crate::domain::joystick::{JoystickGeometry, JoystickInput};
use crate::domain::link::{LinkEvent, SerialLink};
use crate::domain::models::{
    AppEvent, DiscoveredDevice, MessageSeverity, PeerId, PowerState, SessionCommand,
    SessionSnapshot, SessionState, StatusMessage,
};
use crate::domain::settings::Settings;
use crate::domain::timer::{TimerKind, TimerScheduler, Timeout};
use crate::domain::tuning::TuningChannel;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Inbound text starting with this token is a fresh status report and
/// replaces the scrollback.
const STATUS_SNAPSHOT_MARKER: &str = "state";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick_interval: Duration,
    pub scan_timeout: Duration,
    pub connect_timeout: Duration,
    pub command_threshold: f64,
    pub console_max_chars: usize,
    pub joystick: JoystickGeometry,
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            tick_interval: settings.tick_interval(),
            scan_timeout: settings.scan_timeout(),
            connect_timeout: settings.connect_timeout(),
            command_threshold: settings.command_threshold,
            console_max_chars: settings.console_max_chars,
            joystick: JoystickGeometry::square(
                settings.joystick_background_size,
                settings.joystick_handle_size,
            ),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

pub struct SessionController<L: SerialLink, S: TimerScheduler> {
    link: L,
    scheduler: S,
    config: SessionConfig,
    encoder: CommandEncoder,
    joystick: JoystickInput,
    console: Scrollback,
    devices: DeviceList,

    state: SessionState,
    selected: Option<PeerId>,
    scan_settled: bool,
    picker_open: bool,
    connecting: bool,

    // Timer bookkeeping
    next_epoch: u64,
    scan_epoch: u64,
    connect_epoch: u64,

    subscriber: Option<mpsc::UnboundedSender<AppEvent>>,
}

impl<L: SerialLink, S: TimerScheduler> SessionController<L, S> {
    pub fn new(link: L, scheduler: S, config: SessionConfig) -> Self {
        Self {
            link,
            scheduler,
            encoder: CommandEncoder::new(config.command_threshold),
            joystick: JoystickInput::new(config.joystick),
            console: Scrollback::new(config.console_max_chars),
            devices: DeviceList::new(),
            config,
            state: SessionState::Idle,
            selected: None,
            scan_settled: false,
            picker_open: false,
            connecting: false,
            next_epoch: 0,
            scan_epoch: 0,
            connect_epoch: 0,
            subscriber: None,
        }
    }

    /// Replaces the current subscriber and brings it up to date.
    pub fn subscribe(&mut self, subscriber: mpsc::UnboundedSender<AppEvent>) {
        self.subscriber = Some(subscriber);
        self.publish();
        self.publish_joystick();
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            power: self.link.power_state(),
            link_ready: self.link.is_ready(),
            devices: self.devices.as_slice().to_vec(),
            selected: self.selected.clone(),
            scan_settled: self.scan_settled,
            rescan_available: self.rescan_available(),
            picker_open: self.picker_open,
            connecting: self.connecting,
            console: self.console.text().to_string(),
        }
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    pub fn handle_command(&mut self, command: SessionCommand) {
        let result = match command {
            SessionCommand::StartScan => self.start_scan(),
            SessionCommand::Rescan => self.rescan(),
            SessionCommand::CancelPicker => {
                self.cancel_picker();
                Ok(())
            }
            SessionCommand::SelectDevice(id) => self.select_device(&id),
            SessionCommand::Disconnect => {
                self.disconnect();
                Ok(())
            }
            SessionCommand::ToggleTuning => self.toggle_tuning(),
            SessionCommand::SubmitTuning { parameter, raw } => {
                self.submit_tuning(&parameter, &raw)
            }
            SessionCommand::SaveTuning => {
                self.save_tuning();
                Ok(())
            }
            SessionCommand::TouchBegin(point) => {
                self.joystick.on_touch_begin(point);
                self.publish_joystick();
                return;
            }
            SessionCommand::TouchMove(point) => {
                self.joystick.on_touch_move(point);
                self.publish_joystick();
                return;
            }
            SessionCommand::TouchEnd => {
                self.joystick.on_touch_end();
                self.publish_joystick();
                return;
            }
            SessionCommand::Shutdown => {
                self.shutdown();
                Ok(())
            }
        };

        if let Err(e) = result {
            self.surface(e);
        }
        self.publish();
    }

    pub fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Discovered {
                peer,
                name,
                signal_strength,
            } => self.on_discovered(DiscoveredDevice {
                id: peer,
                name,
                signal_strength,
            }),
            LinkEvent::Ready => self.on_ready(),
            LinkEvent::Disconnected { peer, error } => self.on_disconnected(&peer, error),
            LinkEvent::FailedToConnect { peer, error } => self.on_failed_to_connect(&peer, error),
            LinkEvent::PowerStateChanged => self.on_power_state_changed(),
            LinkEvent::MessageReceived(text) => self.on_message(&text),
        }
        self.publish();
    }

    pub fn handle_timeout(&mut self, timeout: Timeout) {
        match timeout.kind {
            TimerKind::ScanTimeout => self.on_scan_timeout(timeout.epoch),
            TimerKind::ConnectTimeout => self.on_connect_timeout(timeout.epoch),
        }
        self.publish();
    }

    /// One beat of the command stream. Returns the byte handed to the link, if any.
    pub fn tick(&mut self) -> Option<u8> {
        if self.state != SessionState::Ready {
            return None;
        }

        let byte = self.encoder.encode(self.joystick.displacement());
        if byte == 0 {
            return None;
        }

        match self.link.send(&[byte]) {
            Ok(()) => {
                trace!("Sent command {:#04x}", byte);
                Some(byte)
            }
            Err(e) => {
                trace!("Dropped command {:#04x}: {}", byte, e);
                None
            }
        }
    }

    // ---------------------------------------------------------------------
    // User operations
    // ---------------------------------------------------------------------

    pub fn start_scan(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Scanning => {
                self.picker_open = true;
                return Ok(());
            }
            _ => {
                return Err(SessionError::OperationRejected(
                    "Already connected".to_string(),
                ))
            }
        }

        if self.link.power_state() != PowerState::PoweredOn {
            return Err(SessionError::bluetooth_not_enabled());
        }

        self.begin_scan()
    }

    /// Restarts discovery from the device picker once the previous scan settled.
    pub fn rescan(&mut self) -> Result<(), SessionError> {
        if !self.rescan_available() {
            return Err(SessionError::OperationRejected(
                "Scan already in progress".to_string(),
            ));
        }
        if self.link.power_state() != PowerState::PoweredOn {
            return Err(SessionError::bluetooth_not_enabled());
        }

        if self.state == SessionState::Scanning {
            self.stop_scan_quietly();
        }
        self.begin_scan()
    }

    /// Closes the device picker, abandoning any scan or connection attempt.
    pub fn cancel_picker(&mut self) {
        match self.state {
            SessionState::Scanning => {
                self.stop_scan_quietly();
                self.enter_idle();
            }
            SessionState::Connecting => {
                self.link.disconnect();
                self.enter_idle();
            }
            _ => {}
        }
        self.picker_open = false;
    }

    pub fn select_device(&mut self, id: &PeerId) -> Result<(), SessionError> {
        let selectable = self.picker_open
            && matches!(self.state, SessionState::Scanning | SessionState::Idle);
        if !selectable {
            return Err(SessionError::OperationRejected(
                "Device selection is not open".to_string(),
            ));
        }

        let name = self
            .devices
            .get(id)
            .map(|d| d.name.clone())
            .ok_or_else(|| SessionError::OperationRejected(format!("Unknown device {id}")))?;

        if self.state == SessionState::Scanning {
            self.stop_scan_quietly();
        }

        self.selected = Some(id.clone());
        if let Err(e) = self.link.connect(id) {
            warn!("Connect to {} failed immediately: {}", id, e);
            self.enter_idle();
            return Err(SessionError::ConnectFailed);
        }

        self.connecting = true;
        self.transition(SessionState::Connecting);
        self.connect_epoch = self.arm(TimerKind::ConnectTimeout, self.config.connect_timeout);
        self.notify(format!("Connecting to {name}..."), MessageSeverity::Info);
        Ok(())
    }

    /// Drops the link and returns to `Idle`. Does nothing when already idle.
    pub fn disconnect(&mut self) {
        if self.state == SessionState::Idle {
            debug!("Disconnect ignored, session already idle");
            return;
        }

        if self.state == SessionState::Scanning {
            self.stop_scan_quietly();
        }
        self.link.disconnect();
        self.enter_idle();
        self.notify("Disconnected from device", MessageSeverity::Info);
    }

    /// Switches between joystick driving and tuning.
    pub fn toggle_tuning(&mut self) -> Result<(), SessionError> {
        if !self.link.is_ready() {
            return Err(SessionError::device_not_ready());
        }

        let (command, next) = match self.state {
            SessionState::Ready => (ModeCommand::Setup, SessionState::Tuning),
            SessionState::Tuning => (ModeCommand::Run, SessionState::Ready),
            _ => return Err(SessionError::device_not_ready()),
        };

        self.link.send(command.as_bytes()).map_err(|e| {
            warn!("Mode change to {} failed: {}", next, e);
            SessionError::device_not_ready()
        })?;

        self.console.clear();
        self.joystick.release();
        self.transition(next);
        Ok(())
    }

    pub fn submit_tuning(&mut self, parameter: &str, raw: &str) -> Result<(), SessionError> {
        TuningChannel::new(&mut self.link).submit(parameter, raw)
    }

    pub fn save_tuning(&mut self) {
        if TuningChannel::new(&mut self.link).save() {
            self.notify("Parameters saved", MessageSeverity::Success);
        }
    }

    /// Teardown: pending timers are dropped and the link is released.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
        self.disconnect();
        info!("Session shut down");
    }

    // ---------------------------------------------------------------------
    // Link events
    // ---------------------------------------------------------------------

    fn on_discovered(&mut self, device: DiscoveredDevice) {
        if self.state != SessionState::Scanning {
            trace!("Ignoring advertisement from {} while {}", device.id, self.state);
            return;
        }

        let id = device.id.clone();
        let rssi = device.signal_strength;
        if self.devices.insert(device) {
            debug!("Discovered {} ({} dBm)", id, rssi);
        }
    }

    fn on_ready(&mut self) {
        if self.state != SessionState::Connecting {
            debug!("Ignoring ready notification while {}", self.state);
            return;
        }

        self.console.clear();
        self.connecting = false;
        self.picker_open = false;
        self.joystick.release();
        self.transition(SessionState::Ready);

        let name = self
            .selected
            .as_ref()
            .and_then(|id| self.devices.get(id))
            .map(|d| d.name.clone())
            .unwrap_or_else(|| "device".to_string());
        self.notify(format!("Connected to {name}"), MessageSeverity::Success);
    }

    fn on_disconnected(&mut self, peer: &PeerId, error: Option<String>) {
        let previous = self.state;
        if matches!(previous, SessionState::Idle | SessionState::Scanning) {
            debug!("Ignoring disconnect of {} while {}", peer, previous);
            return;
        }

        warn!(
            "Link to {} dropped: {}",
            peer,
            error.as_deref().unwrap_or("no reason given")
        );
        self.enter_idle();

        if previous == SessionState::Connecting {
            self.surface(SessionError::ConnectFailed);
        } else {
            self.surface(SessionError::Disconnected);
        }
    }

    fn on_failed_to_connect(&mut self, peer: &PeerId, error: Option<String>) {
        if self.state != SessionState::Connecting {
            debug!("Ignoring connect failure of {} while {}", peer, self.state);
            return;
        }

        warn!(
            "Failed to connect to {}: {}",
            peer,
            error.as_deref().unwrap_or("no reason given")
        );
        self.enter_idle();
        self.surface(SessionError::ConnectFailed);
    }

    fn on_power_state_changed(&mut self) {
        let power = self.link.power_state();
        info!("Bluetooth power state is now {:?}", power);
        if power == PowerState::PoweredOn {
            return;
        }

        if self.state != SessionState::Idle {
            self.link.disconnect();
            self.enter_idle();
        }
        if self.picker_open {
            debug!("Closing device picker after power loss");
            self.picker_open = false;
        }
        self.surface(SessionError::bluetooth_turned_off());
    }

    fn on_message(&mut self, text: &str) {
        if text.starts_with(STATUS_SNAPSHOT_MARKER) {
            self.console.clear();
        }
        self.console.append(text);
    }

    // ---------------------------------------------------------------------
    // Timers
    // ---------------------------------------------------------------------

    fn on_scan_timeout(&mut self, epoch: u64) {
        if epoch != self.scan_epoch || self.state != SessionState::Scanning {
            trace!("Stale scan timeout {} ignored", epoch);
            return;
        }

        self.scan_settled = true;
        info!("Scan settled with {} device(s)", self.devices.len());
        if self.devices.is_empty() {
            self.notify("No devices found", MessageSeverity::Warning);
        }
    }

    fn on_connect_timeout(&mut self, epoch: u64) {
        if epoch != self.connect_epoch
            || self.state != SessionState::Connecting
            || self.link.connected_peer().is_some()
        {
            debug!("Connect timeout {} ignored while {}", epoch, self.state);
            return;
        }

        warn!(
            "Connection to {} timed out",
            self.selected
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_default()
        );
        self.link.disconnect();
        self.enter_idle();
        self.surface(SessionError::ConnectTimeout);
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn begin_scan(&mut self) -> Result<(), SessionError> {
        self.devices.clear();
        self.selected = None;
        self.scan_settled = false;

        self.link
            .start_scan()
            .map_err(|e| SessionError::TransportUnavailable(e.to_string()))?;

        self.picker_open = true;
        self.transition(SessionState::Scanning);
        self.scan_epoch = self.arm(TimerKind::ScanTimeout, self.config.scan_timeout);
        self.notify("Scanning for devices...", MessageSeverity::Info);
        Ok(())
    }

    fn rescan_available(&self) -> bool {
        self.picker_open
            && match self.state {
                SessionState::Idle => true,
                SessionState::Scanning => self.scan_settled,
                _ => false,
            }
    }

    fn stop_scan_quietly(&mut self) {
        if let Err(e) = self.link.stop_scan() {
            debug!("Stopping scan failed: {}", e);
        }
    }

    fn enter_idle(&mut self) {
        self.selected = None;
        self.connecting = false;
        self.joystick.release();
        self.transition(SessionState::Idle);
    }

    fn arm(&mut self, kind: TimerKind, delay: Duration) -> u64 {
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        self.scheduler.schedule_once(Timeout { kind, epoch }, delay);
        epoch
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            info!("Session {} -> {}", self.state, next);
            self.state = next;
        }
    }

    fn surface(&mut self, error: SessionError) {
        warn!("{}", error);
        self.notify(error.to_string(), MessageSeverity::Error);
        self.emit(AppEvent::Alert(error));
    }

    fn notify(&mut self, message: impl Into<String>, severity: MessageSeverity) {
        self.emit(AppEvent::LogMessage(StatusMessage::new(message, severity)));
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.emit(AppEvent::Snapshot(snapshot));
    }

    fn publish_joystick(&mut self) {
        let view = self.joystick.view();
        self.emit(AppEvent::Joystick(view));
    }

    fn emit(&mut self, event: AppEvent) {
        if let Some(subscriber) = &self.subscriber {
            if subscriber.send(event).is_err() {
                debug!("Subscriber went away");
                self.subscriber = None;
            }
        }
    }
}

#[cfg(test)]
impl<L: SerialLink, S: TimerScheduler> SessionController<L, S> {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn devices(&self) -> &DeviceList {
        &self.devices
    }

    pub fn console(&self) -> &str {
        self.console.text()
    }

    pub fn selected(&self) -> Option<&PeerId> {
        self.selected.as_ref()
    }

    pub fn is_picker_open(&self) -> bool {
        self.picker_open
    }

    pub fn is_scan_settled(&self) -> bool {
        self.scan_settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::command::direction;
    use crate::domain::link::LinkError;
    use crate::domain::models::Point;

    #[derive(Default)]
    struct FakeLink {
        powered_off: bool,
        ready: bool,
        connected: Option<PeerId>,
        scanning: bool,
        calls: Vec<String>,
        sent: Vec<Vec<u8>>,
    }

    impl SerialLink for FakeLink {
        fn start_scan(&mut self) -> Result<(), LinkError> {
            self.calls.push("start_scan".into());
            self.scanning = true;
            Ok(())
        }
        fn stop_scan(&mut self) -> Result<(), LinkError> {
            self.calls.push("stop_scan".into());
            self.scanning = false;
            Ok(())
        }
        fn connect(&mut self, peer: &PeerId) -> Result<(), LinkError> {
            self.calls.push(format!("connect {peer}"));
            Ok(())
        }
        fn disconnect(&mut self) {
            self.calls.push("disconnect".into());
            self.ready = false;
            self.connected = None;
        }
        fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
            if !self.ready {
                return Err(LinkError::NotReady);
            }
            self.sent.push(bytes.to_vec());
            Ok(())
        }
        fn is_ready(&self) -> bool {
            self.ready
        }
        fn connected_peer(&self) -> Option<PeerId> {
            self.connected.clone()
        }
        fn power_state(&self) -> PowerState {
            if self.powered_off {
                PowerState::PoweredOff
            } else {
                PowerState::PoweredOn
            }
        }
    }

    #[derive(Default)]
    struct FakeScheduler {
        armed: Vec<(Timeout, Duration)>,
        cancelled: bool,
    }

    impl TimerScheduler for FakeScheduler {
        fn schedule_once(&mut self, timeout: Timeout, delay: Duration) {
            self.armed.push((timeout, delay));
        }
        fn cancel_all(&mut self) {
            self.cancelled = true;
        }
    }

    type Controller = SessionController<FakeLink, FakeScheduler>;

    fn controller() -> (Controller, mpsc::UnboundedReceiver<AppEvent>) {
        let mut ctrl = SessionController::new(
            FakeLink::default(),
            FakeScheduler::default(),
            SessionConfig::default(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        ctrl.subscribe(tx);
        (ctrl, rx)
    }

    fn discovered(id: &str, rssi: i16) -> LinkEvent {
        LinkEvent::Discovered {
            peer: PeerId::new(id),
            name: format!("Robot {id}"),
            signal_strength: rssi,
        }
    }

    fn last_armed(ctrl: &Controller) -> Timeout {
        ctrl.scheduler.armed.last().unwrap().0
    }

    fn alerts(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> Vec<SessionError> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Alert(e) = event {
                out.push(e);
            }
        }
        out
    }

    fn scanning_with_device(ctrl: &mut Controller) {
        ctrl.start_scan().unwrap();
        ctrl.handle_link_event(discovered("A", -70));
    }

    fn connecting(ctrl: &mut Controller) {
        scanning_with_device(ctrl);
        ctrl.select_device(&PeerId::new("A")).unwrap();
    }

    fn ready(ctrl: &mut Controller) {
        connecting(ctrl);
        ctrl.link.ready = true;
        ctrl.link.connected = Some(PeerId::new("A"));
        ctrl.handle_link_event(LinkEvent::Ready);
        assert_eq!(ctrl.state(), SessionState::Ready);
    }

    fn deflect_forward_left(ctrl: &mut Controller) {
        ctrl.handle_command(SessionCommand::TouchBegin(Point::new(100.0, 100.0)));
        ctrl.handle_command(SessionCommand::TouchMove(Point::new(40.0, 40.0)));
    }

    #[test]
    fn test_start_scan_requires_power() {
        let (mut ctrl, _rx) = controller();
        ctrl.link.powered_off = true;

        let err = ctrl.start_scan().unwrap_err();
        assert_eq!(err, SessionError::bluetooth_not_enabled());
        assert_eq!(ctrl.state(), SessionState::Idle);
        assert!(ctrl.link.calls.is_empty());
        assert!(!ctrl.is_picker_open());
    }

    #[test]
    fn test_start_scan_arms_scan_timeout() {
        let (mut ctrl, _rx) = controller();
        ctrl.start_scan().unwrap();

        assert_eq!(ctrl.state(), SessionState::Scanning);
        assert!(ctrl.is_picker_open());
        assert!(ctrl.link.scanning);
        let (timeout, delay) = ctrl.scheduler.armed[0];
        assert_eq!(timeout.kind, TimerKind::ScanTimeout);
        assert_eq!(delay, Duration::from_secs(10));
    }

    #[test]
    fn test_discovery_is_deduplicated_and_sorted() {
        let (mut ctrl, _rx) = controller();
        ctrl.start_scan().unwrap();
        ctrl.handle_link_event(discovered("A", -80));
        ctrl.handle_link_event(discovered("B", -60));
        ctrl.handle_link_event(discovered("A", -80));

        let snapshot = ctrl.snapshot();
        let ids: Vec<_> = snapshot
            .devices
            .iter()
            .map(|d| (d.id.0.clone(), d.signal_strength))
            .collect();
        assert_eq!(ids, vec![("A".to_string(), -80), ("B".to_string(), -60)]);
    }

    #[test]
    fn test_discovery_outside_scanning_is_ignored() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle_link_event(discovered("A", -80));
        assert!(ctrl.devices().is_empty());
    }

    #[test]
    fn test_scan_timeout_offers_rescan_without_stopping_scan() {
        let (mut ctrl, _rx) = controller();
        ctrl.start_scan().unwrap();
        assert!(!ctrl.snapshot().rescan_available);

        ctrl.handle_timeout(last_armed(&ctrl));
        assert!(ctrl.is_scan_settled());
        assert!(ctrl.snapshot().rescan_available);
        assert_eq!(ctrl.state(), SessionState::Scanning);
        assert!(!ctrl.link.calls.contains(&"stop_scan".to_string()));
    }

    #[test]
    fn test_rescan_clears_list_and_ignores_stale_timeout() {
        let (mut ctrl, _rx) = controller();
        scanning_with_device(&mut ctrl);
        let first = last_armed(&ctrl);
        assert!(ctrl.rescan().is_err());

        ctrl.handle_timeout(first);
        ctrl.rescan().unwrap();
        assert!(ctrl.devices().is_empty());
        assert!(!ctrl.is_scan_settled());

        // The first timer firing again must not settle the new scan.
        ctrl.handle_timeout(first);
        assert!(!ctrl.is_scan_settled());

        ctrl.handle_timeout(last_armed(&ctrl));
        assert!(ctrl.is_scan_settled());
    }

    #[test]
    fn test_select_device_connects_with_timeout() {
        let (mut ctrl, _rx) = controller();
        connecting(&mut ctrl);

        assert_eq!(ctrl.state(), SessionState::Connecting);
        assert_eq!(ctrl.selected(), Some(&PeerId::new("A")));
        assert!(ctrl.snapshot().connecting);
        assert_eq!(
            ctrl.link.calls,
            vec!["start_scan", "stop_scan", "connect A"]
        );
        let (timeout, delay) = *ctrl.scheduler.armed.last().unwrap();
        assert_eq!(timeout.kind, TimerKind::ConnectTimeout);
        assert_eq!(delay, Duration::from_secs(10));
    }

    #[test]
    fn test_select_unknown_device_is_rejected() {
        let (mut ctrl, _rx) = controller();
        scanning_with_device(&mut ctrl);
        assert!(matches!(
            ctrl.select_device(&PeerId::new("Z")),
            Err(SessionError::OperationRejected(_))
        ));
        assert_eq!(ctrl.state(), SessionState::Scanning);
    }

    #[test]
    fn test_ready_clears_console_and_dismisses_picker() {
        let (mut ctrl, _rx) = controller();
        connecting(&mut ctrl);
        ctrl.handle_link_event(LinkEvent::MessageReceived("boot noise".into()));
        ctrl.link.ready = true;
        ctrl.handle_link_event(LinkEvent::Ready);

        assert_eq!(ctrl.state(), SessionState::Ready);
        assert!(ctrl.console().is_empty());
        assert!(!ctrl.is_picker_open());
        assert!(!ctrl.snapshot().connecting);
    }

    #[test]
    fn test_connect_timeout_after_ready_is_noop() {
        let (mut ctrl, mut rx) = controller();
        ready(&mut ctrl);
        let timeout = last_armed(&ctrl);
        let calls_before = ctrl.link.calls.len();

        ctrl.handle_timeout(timeout);
        assert_eq!(ctrl.state(), SessionState::Ready);
        assert_eq!(ctrl.link.calls.len(), calls_before);
        assert!(alerts(&mut rx).is_empty());
    }

    #[test]
    fn test_connect_timeout_while_connecting_fails() {
        let (mut ctrl, mut rx) = controller();
        connecting(&mut ctrl);

        ctrl.handle_timeout(last_armed(&ctrl));
        assert_eq!(ctrl.state(), SessionState::Idle);
        assert_eq!(ctrl.selected(), None);
        assert_eq!(ctrl.link.calls.last().unwrap(), "disconnect");
        assert_eq!(alerts(&mut rx), vec![SessionError::ConnectTimeout]);

        let snapshot = ctrl.snapshot();
        assert!(!snapshot.connecting);
        assert!(snapshot.picker_open);
        assert!(snapshot.rescan_available);
    }

    #[test]
    fn test_connect_timeout_skipped_when_link_connected() {
        let (mut ctrl, _rx) = controller();
        connecting(&mut ctrl);
        ctrl.link.connected = Some(PeerId::new("A"));

        ctrl.handle_timeout(last_armed(&ctrl));
        assert_eq!(ctrl.state(), SessionState::Connecting);
    }

    #[test]
    fn test_tick_streams_level_while_ready() {
        let (mut ctrl, _rx) = controller();
        ready(&mut ctrl);
        assert_eq!(ctrl.tick(), None);

        deflect_forward_left(&mut ctrl);
        let expected = direction::LEFT | direction::FORWARD;
        assert_eq!(ctrl.tick(), Some(expected));
        assert_eq!(ctrl.tick(), Some(expected));
        assert_eq!(ctrl.link.sent, vec![vec![expected], vec![expected]]);

        ctrl.handle_command(SessionCommand::TouchEnd);
        assert_eq!(ctrl.tick(), None);
        assert_eq!(ctrl.link.sent.len(), 2);
    }

    #[test]
    fn test_tick_is_silent_outside_ready() {
        let (mut ctrl, _rx) = controller();
        deflect_forward_left(&mut ctrl);
        assert_eq!(ctrl.tick(), None);

        ready(&mut ctrl);
        ctrl.toggle_tuning().unwrap();
        deflect_forward_left(&mut ctrl);
        let sent = ctrl.link.sent.len();
        assert_eq!(ctrl.tick(), None);
        assert_eq!(ctrl.link.sent.len(), sent);
    }

    #[test]
    fn test_tick_send_failure_is_swallowed() {
        let (mut ctrl, mut rx) = controller();
        ready(&mut ctrl);
        deflect_forward_left(&mut ctrl);
        ctrl.link.ready = false;

        assert_eq!(ctrl.tick(), None);
        assert_eq!(ctrl.state(), SessionState::Ready);
        assert!(alerts(&mut rx).is_empty());
    }

    #[test]
    fn test_toggle_tuning_sends_mode_bytes() {
        let (mut ctrl, _rx) = controller();
        ready(&mut ctrl);

        ctrl.handle_link_event(LinkEvent::MessageReceived("speed 3".into()));
        ctrl.toggle_tuning().unwrap();
        assert_eq!(ctrl.state(), SessionState::Tuning);
        assert!(ctrl.console().is_empty());

        ctrl.handle_link_event(LinkEvent::MessageReceived("pidP 1.0".into()));
        ctrl.toggle_tuning().unwrap();
        assert_eq!(ctrl.state(), SessionState::Ready);
        assert!(ctrl.console().is_empty());

        assert_eq!(ctrl.link.sent, vec![b"S".to_vec(), b"R".to_vec()]);
    }

    #[test]
    fn test_toggle_tuning_rejected_without_link() {
        let (mut ctrl, mut rx) = controller();
        ctrl.handle_command(SessionCommand::ToggleTuning);

        assert_eq!(ctrl.state(), SessionState::Idle);
        assert_eq!(alerts(&mut rx), vec![SessionError::device_not_ready()]);
        assert!(ctrl.link.sent.is_empty());
    }

    #[test]
    fn test_disconnect_reaches_idle_from_every_state() {
        let setups: [fn(&mut Controller); 5] = [
            |_| {},
            |c| c.start_scan().unwrap(),
            connecting,
            ready,
            |c| {
                ready(c);
                c.toggle_tuning().unwrap();
            },
        ];

        for setup in setups {
            let (mut ctrl, _rx) = controller();
            setup(&mut ctrl);
            ctrl.handle_command(SessionCommand::Disconnect);
            assert_eq!(ctrl.state(), SessionState::Idle);
            assert!(!ctrl.link.is_ready());
        }
    }

    #[test]
    fn test_disconnect_when_idle_is_noop() {
        let (mut ctrl, mut rx) = controller();
        ctrl.disconnect();
        ctrl.disconnect();
        assert_eq!(ctrl.state(), SessionState::Idle);
        assert!(ctrl.link.calls.is_empty());
        assert!(alerts(&mut rx).is_empty());
    }

    #[test]
    fn test_power_loss_reaches_idle_from_every_state() {
        let setups: [fn(&mut Controller); 5] = [
            |_| {},
            |c| c.start_scan().unwrap(),
            connecting,
            ready,
            |c| {
                ready(c);
                c.toggle_tuning().unwrap();
            },
        ];

        for setup in setups {
            let (mut ctrl, mut rx) = controller();
            setup(&mut ctrl);
            ctrl.link.powered_off = true;
            ctrl.handle_link_event(LinkEvent::PowerStateChanged);

            assert_eq!(ctrl.state(), SessionState::Idle);
            assert!(!ctrl.is_picker_open());
            assert_eq!(alerts(&mut rx), vec![SessionError::bluetooth_turned_off()]);
        }
    }

    #[test]
    fn test_power_on_notification_keeps_state() {
        let (mut ctrl, mut rx) = controller();
        ready(&mut ctrl);
        ctrl.handle_link_event(LinkEvent::PowerStateChanged);
        assert_eq!(ctrl.state(), SessionState::Ready);
        assert!(alerts(&mut rx).is_empty());
    }

    #[test]
    fn test_unexpected_drop_surfaces_cause() {
        let (mut ctrl, mut rx) = controller();
        ready(&mut ctrl);
        ctrl.handle_link_event(LinkEvent::Disconnected {
            peer: PeerId::new("A"),
            error: Some("supervision timeout".into()),
        });
        assert_eq!(ctrl.state(), SessionState::Idle);
        assert_eq!(alerts(&mut rx), vec![SessionError::Disconnected]);

        let (mut ctrl, mut rx) = controller();
        connecting(&mut ctrl);
        ctrl.handle_link_event(LinkEvent::Disconnected {
            peer: PeerId::new("A"),
            error: None,
        });
        assert_eq!(ctrl.state(), SessionState::Idle);
        assert_eq!(alerts(&mut rx), vec![SessionError::ConnectFailed]);
    }

    #[test]
    fn test_failed_to_connect_returns_to_idle() {
        let (mut ctrl, mut rx) = controller();
        connecting(&mut ctrl);
        ctrl.handle_link_event(LinkEvent::FailedToConnect {
            peer: PeerId::new("A"),
            error: Some("refused".into()),
        });
        assert_eq!(ctrl.state(), SessionState::Idle);
        assert!(ctrl.snapshot().rescan_available);
        assert_eq!(alerts(&mut rx), vec![SessionError::ConnectFailed]);
    }

    #[test]
    fn test_disconnect_event_after_manual_disconnect_is_quiet() {
        let (mut ctrl, mut rx) = controller();
        ready(&mut ctrl);
        ctrl.disconnect();
        ctrl.handle_link_event(LinkEvent::Disconnected {
            peer: PeerId::new("A"),
            error: None,
        });
        assert!(alerts(&mut rx).is_empty());
    }

    #[test]
    fn test_status_marker_replaces_scrollback() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle_link_event(LinkEvent::MessageReceived("hello ".into()));
        ctrl.handle_link_event(LinkEvent::MessageReceived("robot".into()));
        assert_eq!(ctrl.console(), "hello robot");

        ctrl.handle_link_event(LinkEvent::MessageReceived("state: run\n".into()));
        assert_eq!(ctrl.console(), "state: run\n");
    }

    #[test]
    fn test_submit_tuning_through_session() {
        let (mut ctrl, mut rx) = controller();
        ready(&mut ctrl);
        ctrl.toggle_tuning().unwrap();

        ctrl.handle_command(SessionCommand::SubmitTuning {
            parameter: "P".into(),
            raw: "1.5".into(),
        });
        ctrl.handle_command(SessionCommand::SubmitTuning {
            parameter: "pidI".into(),
            raw: "abc".into(),
        });
        ctrl.handle_command(SessionCommand::SaveTuning);

        assert_eq!(
            ctrl.link.sent,
            vec![b"S".to_vec(), b"pidP1.5\r".to_vec(), b"W".to_vec()]
        );
        assert_eq!(
            alerts(&mut rx),
            vec![SessionError::Validation("Try a number".into())]
        );
    }

    #[test]
    fn test_cancel_picker_stops_scan() {
        let (mut ctrl, _rx) = controller();
        ctrl.start_scan().unwrap();
        ctrl.handle_command(SessionCommand::CancelPicker);

        assert_eq!(ctrl.state(), SessionState::Idle);
        assert!(!ctrl.is_picker_open());
        assert!(!ctrl.link.scanning);
    }

    #[test]
    fn test_subscribe_replaces_previous_subscriber() {
        let (mut ctrl, mut first) = controller();
        while first.try_recv().is_ok() {}

        let (tx, mut second) = mpsc::unbounded_channel();
        ctrl.subscribe(tx);
        ctrl.handle_command(SessionCommand::StartScan);

        assert!(first.try_recv().is_err());
        assert!(matches!(second.try_recv(), Ok(AppEvent::Snapshot(_))));
    }

    #[test]
    fn test_shutdown_cancels_timers_and_disconnects() {
        let (mut ctrl, _rx) = controller();
        ready(&mut ctrl);
        ctrl.handle_command(SessionCommand::Shutdown);

        assert!(ctrl.scheduler.cancelled);
        assert_eq!(ctrl.state(), SessionState::Idle);
        assert_eq!(ctrl.link.calls.last().unwrap(), "disconnect");
    }
}
