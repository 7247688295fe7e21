//! Simulated robot
//!
//! Answers like the firmware does: a mode byte switches between run and setup,
//! direction bytes drive (logged only), tuning lines update a parameter table,
//! and `W` acknowledges a save. Every reply is delivered as one
//! [`LinkEvent::MessageReceived`].

use crate::domain::command::{direction, ModeCommand, LINE_END};
use crate::domain::link::{LinkError, LinkEvent, SerialLink};
use crate::domain::models::{PeerId, PowerState};
use crate::domain::tuning::TuningParameter;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

struct SimulatedPeer {
    id: PeerId,
    name: &'static str,
    signal_strength: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RobotMode {
    Run,
    Setup,
}

pub struct LoopbackLink {
    events: mpsc::UnboundedSender<LinkEvent>,
    peers: Vec<SimulatedPeer>,
    scanning: bool,
    connected: Option<PeerId>,
    mode: RobotMode,
    parameters: HashMap<TuningParameter, f32>,
}

impl LoopbackLink {
    pub fn new(events: mpsc::UnboundedSender<LinkEvent>) -> Self {
        let parameters = TuningParameter::ALL
            .iter()
            .map(|p| (*p, default_value(*p)))
            .collect();

        Self {
            events,
            peers: vec![
                SimulatedPeer {
                    id: PeerId::new("loopback-1"),
                    name: "Balance Bot (simulated)",
                    signal_strength: -48,
                },
                SimulatedPeer {
                    id: PeerId::new("loopback-2"),
                    name: "Rover (simulated)",
                    signal_strength: -71,
                },
            ],
            scanning: false,
            connected: None,
            mode: RobotMode::Run,
            parameters,
        }
    }

    #[cfg(test)]
    pub fn parameter(&self, parameter: TuningParameter) -> Option<f32> {
        self.parameters.get(&parameter).copied()
    }

    fn emit(&self, event: LinkEvent) {
        let _ = self.events.send(event);
    }

    fn reply(&self, text: impl Into<String>) {
        self.emit(LinkEvent::MessageReceived(text.into()));
    }

    fn status_report(&self) -> String {
        match self.mode {
            RobotMode::Run => "state: run\n".to_string(),
            RobotMode::Setup => {
                let mut report = String::from("state: setup\n");
                for p in TuningParameter::ALL {
                    let value = self.parameters.get(&p).copied().unwrap_or_default();
                    report.push_str(&format!("{} {:.2}\n", p.prefix(), value));
                }
                report
            }
        }
    }

    fn handle_byte(&mut self, byte: u8) {
        match byte {
            b if b == ModeCommand::Run.as_bytes()[0] => {
                self.mode = RobotMode::Run;
                self.reply(self.status_report());
            }
            b if b == ModeCommand::Setup.as_bytes()[0] => {
                self.mode = RobotMode::Setup;
                self.reply(self.status_report());
            }
            b if b == ModeCommand::Write.as_bytes()[0] => {
                info!("Simulated robot persisted its parameters");
                self.reply("saved\n");
            }
            b if b & !(direction::LEFT | direction::RIGHT | direction::FORWARD | direction::BACK)
                == 0 =>
            {
                trace!("Simulated robot driving {:#04x}", b);
            }
            other => debug!("Simulated robot ignored byte {:#04x}", other),
        }
    }

    fn handle_line(&mut self, line: &str) {
        if self.mode != RobotMode::Setup {
            self.reply(format!("ignored {line}: not in setup\n"));
            return;
        }

        match TuningParameter::parse_line(line) {
            Some((parameter, value)) => {
                self.parameters.insert(parameter, value);
                self.reply(format!("ok {} {:.2}\n", parameter.prefix(), value));
            }
            None => self.reply(format!("unknown {line}\n")),
        }
    }
}

fn default_value(parameter: TuningParameter) -> f32 {
    match parameter {
        TuningParameter::P => 12.0,
        TuningParameter::I => 0.5,
        TuningParameter::D => 0.8,
        TuningParameter::DeadBand => 2.0,
        TuningParameter::OutputMin => -255.0,
        TuningParameter::OutputMax => 255.0,
        TuningParameter::TurnSpeed => 60.0,
        TuningParameter::MaxSpeed => 120.0,
    }
}

impl SerialLink for LoopbackLink {
    fn start_scan(&mut self) -> Result<(), LinkError> {
        if self.scanning {
            debug!("Restarting simulated scan");
        }
        self.scanning = true;
        for peer in &self.peers {
            self.emit(LinkEvent::Discovered {
                peer: peer.id.clone(),
                name: peer.name.to_string(),
                signal_strength: peer.signal_strength,
            });
        }
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), LinkError> {
        self.scanning = false;
        Ok(())
    }

    fn connect(&mut self, peer: &PeerId) -> Result<(), LinkError> {
        if !self.peers.iter().any(|p| &p.id == peer) {
            return Err(LinkError::UnknownPeer(peer.clone()));
        }

        self.connected = Some(peer.clone());
        self.mode = RobotMode::Run;
        self.emit(LinkEvent::Ready);
        self.reply(self.status_report());
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(peer) = self.connected.take() {
            self.emit(LinkEvent::Disconnected { peer, error: None });
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if self.connected.is_none() {
            return Err(LinkError::NotReady);
        }

        match bytes {
            [byte] => self.handle_byte(*byte),
            _ => {
                let text = String::from_utf8_lossy(bytes);
                self.handle_line(text.trim_end_matches(LINE_END));
            }
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.is_some()
    }

    fn connected_peer(&self) -> Option<PeerId> {
        self.connected.clone()
    }

    fn power_state(&self) -> PowerState {
        PowerState::PoweredOn
    }
}
