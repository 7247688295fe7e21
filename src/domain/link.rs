//! Serial link port
//!
//! The session talks to the robot through an opaque byte-oriented link. Calls
//! never block: anything slow (scanning, GATT setup, writes) happens in the
//! background and reports back through [`LinkEvent`]s on the channel the link
//! was created with.

use crate::domain::models::{PeerId, PowerState};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("link is not ready")]
    NotReady,
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Notifications emitted by a [`SerialLink`].
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Discovered {
        peer: PeerId,
        name: String,
        signal_strength: i16,
    },
    Ready,
    Disconnected {
        peer: PeerId,
        error: Option<String>,
    },
    FailedToConnect {
        peer: PeerId,
        error: Option<String>,
    },
    PowerStateChanged,
    MessageReceived(String),
}

pub trait SerialLink: Send {
    fn start_scan(&mut self) -> Result<(), LinkError>;
    fn stop_scan(&mut self) -> Result<(), LinkError>;
    fn connect(&mut self, peer: &PeerId) -> Result<(), LinkError>;
    fn disconnect(&mut self);
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError>;
    fn is_ready(&self) -> bool;
    fn connected_peer(&self) -> Option<PeerId>;
    fn power_state(&self) -> PowerState;
}

impl<L: SerialLink + ?Sized> SerialLink for Box<L> {
    fn start_scan(&mut self) -> Result<(), LinkError> {
        (**self).start_scan()
    }

    fn stop_scan(&mut self) -> Result<(), LinkError> {
        (**self).stop_scan()
    }

    fn connect(&mut self, peer: &PeerId) -> Result<(), LinkError> {
        (**self).connect(peer)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        (**self).send(bytes)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn connected_peer(&self) -> Option<PeerId> {
        (**self).connected_peer()
    }

    fn power_state(&self) -> PowerState {
        (**self).power_state()
    }
}
