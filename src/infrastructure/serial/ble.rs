//! BLE UART link
//!
//! Talks to HM-10 style modules: one service with a single characteristic that
//! carries bytes both ways (write-without-response out, notifications in).

use crate::domain::link::{LinkError, LinkEvent, SerialLink};
use crate::domain::models::{PeerId, PowerState};
use crate::domain::settings::Settings;
use anyhow::{anyhow, Result};
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Signal strength reported for peers that did not include one.
const UNKNOWN_RSSI: i16 = -127;

struct Connected {
    peer: PeerId,
    writer: mpsc::UnboundedSender<Vec<u8>>,
}

#[derive(Default)]
struct Shared {
    peers: HashMap<PeerId, PeripheralId>,
    connected: Option<Connected>,
}

pub struct BleSerialLink {
    adapter: Adapter,
    events: mpsc::UnboundedSender<LinkEvent>,
    shared: Arc<Mutex<Shared>>,
    service_uuid: Uuid,
    char_uuid: Uuid,
    target: Option<PeripheralId>,
    connection_task: Option<JoinHandle<()>>,
    event_pump: JoinHandle<()>,
}

impl BleSerialLink {
    /// Picks the first adapter and starts listening for central events.
    pub async fn open(settings: &Settings, events: mpsc::UnboundedSender<LinkEvent>) -> Result<Self> {
        let service_uuid = Uuid::parse_str(&settings.ble_service_uuid)?;
        let char_uuid = Uuid::parse_str(&settings.ble_char_uuid)?;

        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;
        info!("Using Bluetooth adapter {}", adapter.adapter_info().await?);

        let shared = Arc::new(Mutex::new(Shared::default()));
        let event_pump = tokio::spawn(pump_central_events(
            adapter.clone(),
            shared.clone(),
            events.clone(),
        ));

        Ok(Self {
            adapter,
            events,
            shared,
            service_uuid,
            char_uuid,
            target: None,
            connection_task: None,
            event_pump,
        })
    }

    fn abort_connection_task(&mut self) {
        if let Some(task) = self.connection_task.take() {
            task.abort();
        }
    }
}

async fn pump_central_events(
    adapter: Adapter,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    let mut stream = match adapter.events().await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Could not subscribe to adapter events: {}", e);
            return;
        }
    };

    while let Some(event) = stream.next().await {
        match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                let Ok(peripheral) = adapter.peripheral(&id).await else {
                    continue;
                };
                let Ok(Some(props)) = peripheral.properties().await else {
                    continue;
                };

                let peer = PeerId::new(format!("{:?}", id));
                if let Ok(mut shared) = shared.lock() {
                    shared.peers.insert(peer.clone(), id);
                }
                let _ = events.send(LinkEvent::Discovered {
                    peer,
                    name: props.local_name.unwrap_or_else(|| "Unknown".to_string()),
                    signal_strength: props.rssi.unwrap_or(UNKNOWN_RSSI),
                });
            }
            CentralEvent::DeviceDisconnected(id) => {
                let peer = PeerId::new(format!("{:?}", id));
                if release_connection(&shared, &peer) {
                    let _ = events.send(LinkEvent::Disconnected { peer, error: None });
                }
            }
            _ => {}
        }
    }
    debug!("Adapter event stream ended");
}

async fn open_uart(
    adapter: &Adapter,
    id: &PeripheralId,
    service_uuid: Uuid,
    char_uuid: Uuid,
) -> Result<(Peripheral, Characteristic)> {
    let peripheral = adapter.peripheral(id).await?;
    peripheral.connect().await?;
    peripheral.discover_services().await?;

    let characteristic = peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == char_uuid && c.service_uuid == service_uuid)
        .ok_or_else(|| anyhow!("UART characteristic {} not found", char_uuid))?;
    peripheral.subscribe(&characteristic).await?;

    Ok((peripheral, characteristic))
}

/// Owns an open connection: forwards notifications up and serializes writes.
async fn run_connection(
    adapter: Adapter,
    id: PeripheralId,
    peer: PeerId,
    service_uuid: Uuid,
    char_uuid: Uuid,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    let opened = async {
        let (peripheral, characteristic) = open_uart(&adapter, &id, service_uuid, char_uuid).await?;
        let notifications = peripheral.notifications().await?;
        Ok::<_, anyhow::Error>((peripheral, characteristic, notifications))
    }
    .await;

    let (peripheral, characteristic, mut notifications) = match opened {
        Ok(opened) => opened,
        Err(e) => {
            warn!("Connecting to {} failed: {}", peer, e);
            let _ = events.send(LinkEvent::FailedToConnect {
                peer,
                error: Some(e.to_string()),
            });
            return;
        }
    };

    let (writer, mut outgoing) = mpsc::unbounded_channel::<Vec<u8>>();
    if let Ok(mut shared) = shared.lock() {
        shared.connected = Some(Connected {
            peer: peer.clone(),
            writer,
        });
    }
    info!("UART link to {} is ready", peer);
    let _ = events.send(LinkEvent::Ready);

    loop {
        tokio::select! {
            notification = notifications.next() => {
                let Some(notification) = notification else { break };
                if notification.uuid == char_uuid {
                    let text = String::from_utf8_lossy(&notification.value).into_owned();
                    let _ = events.send(LinkEvent::MessageReceived(text));
                }
            }
            bytes = outgoing.recv() => {
                let Some(bytes) = bytes else { break };
                if let Err(e) = peripheral
                    .write(&characteristic, &bytes, WriteType::WithoutResponse)
                    .await
                {
                    debug!("BLE write failed: {}", e);
                }
            }
        }
    }
    debug!("Connection task for {} finished", peer);

    if release_connection(&shared, &peer) {
        warn!("UART link to {} closed", peer);
        let _ = events.send(LinkEvent::Disconnected {
            peer,
            error: Some("link closed".to_string()),
        });
    }
}

/// Clears the connection if it still belongs to `peer`. Returns whether it did,
/// so a drop already reported by the adapter is not reported twice.
fn release_connection(shared: &Mutex<Shared>, peer: &PeerId) -> bool {
    shared
        .lock()
        .map(|mut shared| {
            let current = shared.connected.as_ref().is_some_and(|c| &c.peer == peer);
            if current {
                shared.connected = None;
            }
            current
        })
        .unwrap_or(false)
}

impl SerialLink for BleSerialLink {
    fn start_scan(&mut self) -> Result<(), LinkError> {
        let adapter = self.adapter.clone();
        let filter = ScanFilter {
            services: vec![self.service_uuid],
        };
        tokio::spawn(async move {
            if let Err(e) = adapter.start_scan(filter).await {
                error!("Failed to start scan: {}", e);
            }
        });
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), LinkError> {
        let adapter = self.adapter.clone();
        tokio::spawn(async move {
            if let Err(e) = adapter.stop_scan().await {
                debug!("Failed to stop scan: {}", e);
            }
        });
        Ok(())
    }

    fn connect(&mut self, peer: &PeerId) -> Result<(), LinkError> {
        let id = self
            .shared
            .lock()
            .map_err(|_| LinkError::Transport("Lock error".to_string()))?
            .peers
            .get(peer)
            .cloned()
            .ok_or_else(|| LinkError::UnknownPeer(peer.clone()))?;

        self.abort_connection_task();
        self.target = Some(id.clone());
        self.connection_task = Some(tokio::spawn(run_connection(
            self.adapter.clone(),
            id,
            peer.clone(),
            self.service_uuid,
            self.char_uuid,
            self.shared.clone(),
            self.events.clone(),
        )));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.abort_connection_task();
        if let Ok(mut shared) = self.shared.lock() {
            shared.connected = None;
        }

        if let Some(id) = self.target.take() {
            let adapter = self.adapter.clone();
            tokio::spawn(async move {
                if let Ok(peripheral) = adapter.peripheral(&id).await {
                    if let Err(e) = peripheral.disconnect().await {
                        debug!("BLE disconnect failed: {}", e);
                    }
                }
            });
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let shared = self
            .shared
            .lock()
            .map_err(|_| LinkError::Transport("Lock error".to_string()))?;
        let connected = shared.connected.as_ref().ok_or(LinkError::NotReady)?;
        connected
            .writer
            .send(bytes.to_vec())
            .map_err(|_| LinkError::NotReady)
    }

    fn is_ready(&self) -> bool {
        self.shared
            .lock()
            .map(|s| s.connected.is_some())
            .unwrap_or(false)
    }

    fn connected_peer(&self) -> Option<PeerId> {
        self.shared
            .lock()
            .ok()
            .and_then(|s| s.connected.as_ref().map(|c| c.peer.clone()))
    }

    fn power_state(&self) -> PowerState {
        PowerState::PoweredOn
    }
}

impl Drop for BleSerialLink {
    fn drop(&mut self) {
        self.abort_connection_task();
        self.event_pump.abort();
    }
}
