//! Session worker
//!
//! Runs the [`SessionController`] on its own thread with a current-thread
//! tokio runtime. Everything that touches the session (UI commands, link
//! events, timer expiries, the periodic tick) is funnelled into one loop.

use crate::domain::error::SessionError;
use crate::domain::link::{LinkEvent, SerialLink};
use crate::domain::models::{AppEvent, SessionCommand};
use crate::domain::session::{SessionConfig, SessionController};
use crate::domain::settings::{LinkBackend, Settings};
use crate::domain::timer::{TimerScheduler, Timeout};
use crate::infrastructure::scheduler::TokioScheduler;
#[cfg(feature = "ble")]
use crate::infrastructure::serial::BleSerialLink;
use crate::infrastructure::serial::LoopbackLink;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SessionHandle {
    pub fn send(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            warn!("Session worker is not running");
        }
    }

    /// Stops the worker and waits for it to release the link.
    pub fn shutdown(&mut self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Session worker panicked");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn spawn_session_worker(
    settings: Settings,
    events: mpsc::UnboundedSender<AppEvent>,
) -> anyhow::Result<SessionHandle> {
    let (commands, commands_rx) = mpsc::unbounded_channel();

    let thread = std::thread::Builder::new()
        .name("session-worker".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to create tokio runtime for the session: {}", e);
                    return;
                }
            };

            if let Err(e) = runtime.block_on(run_session(settings, commands_rx, events)) {
                error!("Session worker stopped: {:#}", e);
            }
        })?;

    Ok(SessionHandle {
        commands,
        thread: Some(thread),
    })
}

async fn run_session(
    settings: Settings,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedSender<AppEvent>,
) -> anyhow::Result<()> {
    let (link_tx, link_rx) = mpsc::unbounded_channel();
    let (timer_tx, timer_rx) = mpsc::unbounded_channel();

    let link = match open_link(&settings, link_tx).await {
        Ok(link) => link,
        Err(e) => {
            let _ = events.send(AppEvent::Alert(SessionError::TransportUnavailable(
                e.to_string(),
            )));
            return Err(e);
        }
    };

    let controller = SessionController::new(
        link,
        TokioScheduler::new(timer_tx),
        SessionConfig::from_settings(&settings),
    );
    drive(controller, commands, link_rx, timer_rx, events).await;
    Ok(())
}

async fn open_link(
    settings: &Settings,
    events: mpsc::UnboundedSender<LinkEvent>,
) -> anyhow::Result<Box<dyn SerialLink>> {
    match settings.link_backend {
        LinkBackend::Loopback => {
            info!("Using the simulated robot link");
            Ok(Box::new(LoopbackLink::new(events)))
        }
        #[cfg(feature = "ble")]
        LinkBackend::Ble => {
            info!("Using the BLE UART link");
            Ok(Box::new(BleSerialLink::open(settings, events).await?))
        }
        #[cfg(not(feature = "ble"))]
        LinkBackend::Ble => {
            anyhow::bail!("BLE support is not compiled in (build with --features ble)")
        }
    }
}

/// The session loop. Returns after `Shutdown` or once every command sender is gone.
pub async fn drive<L: SerialLink, S: TimerScheduler>(
    mut controller: SessionController<L, S>,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    mut link_events: mpsc::UnboundedReceiver<LinkEvent>,
    mut timeouts: mpsc::UnboundedReceiver<Timeout>,
    events: mpsc::UnboundedSender<AppEvent>,
) {
    controller.subscribe(events);

    let mut ticker = tokio::time::interval(controller.config().tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Session worker started");
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SessionCommand::Shutdown) | None => {
                    controller.shutdown();
                    break;
                }
                Some(command) => controller.handle_command(command),
            },
            Some(event) = link_events.recv() => controller.handle_link_event(event),
            Some(timeout) = timeouts.recv() => controller.handle_timeout(timeout),
            _ = ticker.tick() => {
                controller.tick();
            }
        }
    }
    info!("Session worker stopped");
}
