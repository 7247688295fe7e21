//! Motion-control tuning
//!
//! Parameters are never stored here; each edit goes straight to the robot.

use crate::domain::command::{ModeCommand, LINE_END};
use crate::domain::error::SessionError;
use crate::domain::link::{LinkError, SerialLink};
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TuningParameter {
    P,
    I,
    D,
    DeadBand,
    OutputMin,
    OutputMax,
    TurnSpeed,
    MaxSpeed,
}

impl TuningParameter {
    pub const ALL: [TuningParameter; 8] = [
        Self::P,
        Self::I,
        Self::D,
        Self::DeadBand,
        Self::OutputMin,
        Self::OutputMax,
        Self::TurnSpeed,
        Self::MaxSpeed,
    ];

    /// Command prefix understood by the robot.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::P => "pidP",
            Self::I => "pidI",
            Self::D => "pidD",
            Self::DeadBand => "pidDB",
            Self::OutputMin => "pidOPMin",
            Self::OutputMax => "pidOPMax",
            Self::TurnSpeed => "turnSpeed",
            Self::MaxSpeed => "maxSpeed",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::P => "P",
            Self::I => "I",
            Self::D => "D",
            Self::DeadBand => "DeadBand",
            Self::OutputMin => "OutputMin",
            Self::OutputMax => "OutputMax",
            Self::TurnSpeed => "TurnSpeed",
            Self::MaxSpeed => "MaxSpeed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::P => "PID P",
            Self::I => "PID I",
            Self::D => "PID D",
            Self::DeadBand => "PID dead band",
            Self::OutputMin => "PID output min",
            Self::OutputMax => "PID output max",
            Self::TurnSpeed => "Turn speed",
            Self::MaxSpeed => "Max speed",
        }
    }

    /// Splits a tuning line (without terminator) into parameter and value.
    /// The longest matching prefix wins so `pidDB` is not read as `pidD`.
    pub fn parse_line(line: &str) -> Option<(TuningParameter, f32)> {
        Self::ALL
            .iter()
            .filter(|p| line.starts_with(p.prefix()))
            .max_by_key(|p| p.prefix().len())
            .and_then(|p| {
                line[p.prefix().len()..]
                    .parse::<f32>()
                    .ok()
                    .map(|value| (*p, value))
            })
    }
}

impl FromStr for TuningParameter {
    type Err = SessionError;

    /// Accepts either the parameter name (`DeadBand`) or its wire prefix (`pidDB`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s || p.prefix() == s)
            .ok_or_else(|| SessionError::Validation(format!("Unknown parameter {s}")))
    }
}

/// Builds the line sent for a parameter edit.
pub fn format_command(parameter: TuningParameter, raw_text: &str) -> String {
    format!("{}{}{}", parameter.prefix(), raw_text, LINE_END)
}

pub struct TuningChannel<'a, L: SerialLink + ?Sized> {
    link: &'a mut L,
}

impl<'a, L: SerialLink + ?Sized> TuningChannel<'a, L> {
    pub fn new(link: &'a mut L) -> Self {
        Self { link }
    }

    /// Validates `raw_text` as a number and forwards it verbatim.
    pub fn submit(&mut self, parameter_name: &str, raw_text: &str) -> Result<(), SessionError> {
        if raw_text.parse::<f32>().is_err() {
            debug!("Rejected tuning input {:?} for {}", raw_text, parameter_name);
            return Err(SessionError::Validation("Try a number".to_string()));
        }
        let parameter: TuningParameter = parameter_name.parse()?;

        let line = format_command(parameter, raw_text);
        self.link.send(line.as_bytes()).map_err(|e| match e {
            LinkError::NotReady => SessionError::device_not_ready(),
            other => SessionError::OperationRejected(other.to_string()),
        })?;

        info!("Sent tuning {} = {}", parameter.name(), raw_text);
        Ok(())
    }

    /// Asks the robot to persist its parameters. Returns whether anything was sent.
    pub fn save(&mut self) -> bool {
        if !self.link.is_ready() {
            debug!("Save ignored, link not ready");
            return false;
        }
        match self.link.send(ModeCommand::Write.as_bytes()) {
            Ok(()) => {
                info!("Requested parameter write");
                true
            }
            Err(e) => {
                debug!("Save failed: {}", e);
                false
            }
        }
    }
}
