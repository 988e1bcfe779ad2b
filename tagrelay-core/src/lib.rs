//! # tagrelay core
//!
//! Domain types and the pure decision stages of the tagrelay pipeline:
//! marker detections, the geometry estimator that turns a detection into a
//! distance/bearing estimate, the rule-based steering policy, and the
//! actuation link that carries the resulting command to a robot.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod actuation;
pub mod error;
pub mod geometry;
pub mod link;
pub mod marker;
pub mod policy;

// Re-export main types
pub use actuation::{ActuationCommand, ActuationSink, LinkState, LoggingSink, MemorySink, SendOutcome};
pub use error::RelayError;
pub use geometry::{apparent_side_px, bearing_deg, distance_from_side, estimate, Calibration};
pub use link::{ActuationLink, Endpoint};
pub use marker::{Detection, Estimate, Point2};
pub use policy::{DecisionPolicy, Maneuver};
