use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    ScanTimeout,
    ConnectTimeout,
}

/// A one-shot timer expiry. `epoch` identifies the arming so a stale expiry
/// can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    pub kind: TimerKind,
    pub epoch: u64,
}

/// Arms one-shot timers whose expiries come back to the session as [`Timeout`]s.
///
/// Timers are not cancelled when they become irrelevant; the receiver checks
/// its state when they fire.
pub trait TimerScheduler: Send {
    fn schedule_once(&mut self, timeout: Timeout, delay: Duration);

    /// Drops every pending timer. Only used on teardown.
    fn cancel_all(&mut self);
}
