//! Actuation commands and the sinks that consume them
//!
//! Delivery is best-effort and at-most-once. A sink that is not open drops
//! the command without reporting an error, and nobody waits for an
//! acknowledgement. Only the most recent command matters to the robot.

use crate::error::RelayError;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, trace};

/// Steering and motor powers for a two-motor differential drive
///
/// Motor 1 is the left motor, motor 2 the right one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActuationCommand {
    /// Steering value; 0 is neutral, negative steers left
    pub steer: i16,
    /// Motor 1 forward power
    pub motor1_forward: u8,
    /// Motor 1 backward power
    pub motor1_backward: u8,
    /// Motor 2 forward power
    pub motor2_forward: u8,
    /// Motor 2 backward power
    pub motor2_backward: u8,
}

impl ActuationCommand {
    /// Full stop: neutral steering, every motor field zero
    pub const STOP: Self = Self {
        steer: 0,
        motor1_forward: 0,
        motor1_backward: 0,
        motor2_forward: 0,
        motor2_backward: 0,
    };

    /// Both motors forward at the same power
    pub const fn forward(power: u8) -> Self {
        Self {
            steer: 0,
            motor1_forward: power,
            motor1_backward: 0,
            motor2_forward: power,
            motor2_backward: 0,
        }
    }

    /// Whether this is the stop command
    pub fn is_stop(&self) -> bool {
        *self == Self::STOP
    }

    /// Newline-terminated wire form: `steer,m1f,m1b,m2f,m2b\n`
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }

    /// Parse one wire line; a trailing line break is optional
    pub fn parse_line(line: &str) -> Result<Self, RelayError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 5 {
            return Err(RelayError::ProtocolError {
                message: format!("expected 5 fields, got {}: {:?}", fields.len(), line),
            });
        }

        let steer = fields[0].parse::<i16>().map_err(|e| RelayError::ProtocolError {
            message: format!("invalid steer {:?}: {}", fields[0], e),
        })?;
        let mut powers = [0u8; 4];
        for (slot, field) in powers.iter_mut().zip(&fields[1..]) {
            *slot = field.parse::<u8>().map_err(|e| RelayError::ProtocolError {
                message: format!("invalid motor power {:?}: {}", field, e),
            })?;
        }

        Ok(Self {
            steer,
            motor1_forward: powers[0],
            motor1_backward: powers[1],
            motor2_forward: powers[2],
            motor2_backward: powers[3],
        })
    }
}

impl fmt::Display for ActuationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.steer,
            self.motor1_forward,
            self.motor1_backward,
            self.motor2_forward,
            self.motor2_backward
        )
    }
}

/// Socket-style link state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    /// Connection is being established
    Connecting,
    /// Commands are accepted
    Open,
    /// Shutdown in progress
    Closing,
    /// No further commands will be delivered
    Closed,
}

/// What happened to a command handed to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendOutcome {
    /// Accepted for delivery
    Sent,
    /// Discarded because the sink was not open
    Dropped,
}

/// Consumer of actuation commands
pub trait ActuationSink: Send + Sync {
    /// Current link state
    fn state(&self) -> LinkState;

    /// Hand a command over without waiting; never fails loudly
    fn send(&self, command: &ActuationCommand) -> SendOutcome;

    /// Stop accepting commands
    fn close(&self) {}
}

/// Dry-run sink that only logs commands
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl ActuationSink for LoggingSink {
    fn state(&self) -> LinkState {
        LinkState::Open
    }

    fn send(&self, command: &ActuationCommand) -> SendOutcome {
        info!(%command, "actuation (dry run)");
        SendOutcome::Sent
    }
}

/// In-memory sink recording every accepted command
///
/// Clones share the same record, so a caller can keep one clone while the
/// pipeline owns another.
#[derive(Debug, Clone)]
pub struct MemorySink {
    commands: Arc<Mutex<Vec<ActuationCommand>>>,
    state: Arc<RwLock<LinkState>>,
}

impl MemorySink {
    /// Create an open, empty sink
    pub fn new() -> Self {
        Self {
            commands: Arc::new(Mutex::new(Vec::new())),
            state: Arc::new(RwLock::new(LinkState::Open)),
        }
    }

    /// Force the link state, e.g. to simulate a closed socket
    pub fn set_state(&self, state: LinkState) {
        *self.state.write() = state;
    }

    /// Commands recorded so far
    pub fn commands(&self) -> Vec<ActuationCommand> {
        self.commands.lock().clone()
    }

    /// Most recent command
    pub fn last(&self) -> Option<ActuationCommand> {
        self.commands.lock().last().copied()
    }

    /// Number of recorded commands
    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuationSink for MemorySink {
    fn state(&self) -> LinkState {
        *self.state.read()
    }

    fn send(&self, command: &ActuationCommand) -> SendOutcome {
        if self.state() != LinkState::Open {
            trace!(%command, "memory sink not open, dropping command");
            return SendOutcome::Dropped;
        }
        self.commands.lock().push(*command);
        SendOutcome::Sent
    }

    fn close(&self) {
        *self.state.write() = LinkState::Closed;
    }
}
