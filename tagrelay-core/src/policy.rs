//! Rule-based steering policy
//!
//! The mapping is state-free: each tick's command depends only on that
//! tick's estimate. There is no smoothing between ticks and no integral or
//! derivative term.

use crate::actuation::ActuationCommand;
use crate::error::RelayError;
use crate::marker::Estimate;
use serde::{Deserialize, Serialize};

/// Discrete maneuver chosen for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Maneuver {
    /// No marker, or close enough: stop
    Stop,
    /// Marker roughly ahead: drive straight
    Forward,
    /// Marker left of the deadband: bias power to the right motor
    TurnLeft,
    /// Marker right of the deadband: bias power to the left motor
    TurnRight,
}

/// Thresholds and powers of the steering policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionPolicy {
    /// At or below this distance the robot stops
    pub stop_distance_m: f64,
    /// Bearings within +/- this many degrees count as straight ahead
    pub bearing_deadband_deg: f64,
    /// Forward power applied to both motors
    pub base_power: u8,
    /// Power moved from the inner to the outer motor when turning
    pub turn_delta: u8,
    /// Largest steering magnitude emitted
    pub max_steer: i16,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            stop_distance_m: 0.6,
            bearing_deadband_deg: 10.0,
            base_power: 160,
            turn_delta: 60,
            max_steer: 45,
        }
    }
}

impl DecisionPolicy {
    /// Validate thresholds
    pub fn validate(&self) -> Result<(), RelayError> {
        if !(self.stop_distance_m.is_finite() && self.stop_distance_m >= 0.0) {
            return Err(RelayError::invalid_config("Stop distance must be >= 0"));
        }

        if !(self.bearing_deadband_deg.is_finite() && self.bearing_deadband_deg >= 0.0) {
            return Err(RelayError::invalid_config("Bearing deadband must be >= 0"));
        }

        if self.turn_delta == 0 {
            return Err(RelayError::invalid_config("Turn delta must be > 0"));
        }

        if self.max_steer < 0 {
            return Err(RelayError::invalid_config("Max steer must be >= 0"));
        }

        Ok(())
    }

    /// Pick the maneuver for this tick's estimate (None = no marker)
    pub fn classify(&self, estimate: Option<&Estimate>) -> Maneuver {
        let Some(estimate) = estimate else {
            return Maneuver::Stop;
        };

        if estimate.distance_m <= self.stop_distance_m {
            Maneuver::Stop
        } else if estimate.bearing_deg < -self.bearing_deadband_deg {
            Maneuver::TurnLeft
        } else if estimate.bearing_deg > self.bearing_deadband_deg {
            Maneuver::TurnRight
        } else {
            Maneuver::Forward
        }
    }

    /// Map this tick's estimate to an actuation command
    pub fn decide(&self, estimate: Option<&Estimate>) -> ActuationCommand {
        let maneuver = self.classify(estimate);
        let steer = estimate
            .map(|e| self.steer_for(e.bearing_deg))
            .unwrap_or(0);

        let inner = self.base_power.saturating_sub(self.turn_delta);
        let outer = self.base_power.saturating_add(self.turn_delta);

        match maneuver {
            Maneuver::Stop => ActuationCommand::STOP,
            Maneuver::Forward => ActuationCommand::forward(self.base_power),
            Maneuver::TurnLeft => ActuationCommand {
                steer,
                motor1_forward: inner,
                motor1_backward: 0,
                motor2_forward: outer,
                motor2_backward: 0,
            },
            Maneuver::TurnRight => ActuationCommand {
                steer,
                motor1_forward: outer,
                motor1_backward: 0,
                motor2_forward: inner,
                motor2_backward: 0,
            },
        }
    }

    fn steer_for(&self, bearing_deg: f64) -> i16 {
        let limit = self.max_steer as f64;
        bearing_deg.round().clamp(-limit, limit) as i16
    }
}
