//! Robot wire protocol
//!
//! Bytes understood by the robot firmware:
//!
//! ```text
//! Direction (one byte, only sent when non-zero)
//!   bit 0 (0x01) : LEFT     displacement dx >  threshold
//!   bit 1 (0x02) : RIGHT    displacement dx < -threshold
//!   bit 2 (0x04) : FORWARD  displacement dy < -threshold
//!   bit 3 (0x08) : BACK     displacement dy >  threshold
//!
//! Mode control (one ASCII byte)
//!   'R' : run mode (joystick driving)
//!   'S' : setup mode (tuning)
//!   'W' : write current parameters to device storage
//!
//! Tuning (ASCII line)
//!   "<prefix><decimal>\r", e.g. "pidP1.5\r"
//! ```

use crate::domain::models::DisplacementVector;

pub mod direction {
    pub const LEFT: u8 = 0x01;
    pub const RIGHT: u8 = 0x02;
    pub const FORWARD: u8 = 0x04;
    pub const BACK: u8 = 0x08;
}

/// Displacement beyond which an axis counts as deflected.
pub const DEFAULT_THRESHOLD: f64 = 30.0;

/// Terminator of a tuning line.
pub const LINE_END: char = '\r';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeCommand {
    /// Leave setup mode and accept joystick commands again
    Run,
    /// Enter setup mode
    Setup,
    /// Persist the tuned parameters on the robot
    Write,
}

impl ModeCommand {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Run => b"R",
            Self::Setup => b"S",
            Self::Write => b"W",
        }
    }
}

/// Level encoder: the byte depends only on the current displacement, so a held
/// stick produces the same byte on every tick.
#[derive(Debug, Clone, Copy)]
pub struct CommandEncoder {
    threshold: f64,
}

impl Default for CommandEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl CommandEncoder {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn encode(&self, displacement: DisplacementVector) -> u8 {
        let mut byte = 0u8;

        if displacement.dx > self.threshold {
            byte |= direction::LEFT;
        } else if displacement.dx < -self.threshold {
            byte |= direction::RIGHT;
        }

        if displacement.dy > self.threshold {
            byte |= direction::BACK;
        } else if displacement.dy < -self.threshold {
            byte |= direction::FORWARD;
        }

        byte
    }
}

/// [`CommandEncoder::encode`] with the default threshold.
pub fn encode(displacement: DisplacementVector) -> u8 {
    CommandEncoder::default().encode(displacement)
}
