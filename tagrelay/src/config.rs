//! Configuration types and defaults

use crate::RelayError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tagrelay_core::{Calibration, DecisionPolicy};
use tagrelay_media::{AprilTagConfig, SamplerConfig, SourceConfig, WorkerConfig};

/// Top-level relay configuration
///
/// Every field has a default, so a JSON file only needs the values it
/// changes:
///
/// ```json
/// { "actuation_endpoint": "tcp://192.168.4.1:9000", "target_marker_id": 3 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Sampling period in milliseconds
    pub tick_interval_ms: u64,
    /// Marker to steer towards when several are visible
    pub target_marker_id: Option<u32>,
    /// `tcp://host:port` or `ws://...`; `None` logs commands instead
    pub actuation_endpoint: Option<String>,
    /// How long to wait for the actuation link to connect
    pub connect_timeout_ms: u64,
    /// Log filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Capacity of the pipeline event channel
    pub event_capacity: usize,
    /// Frame source selection
    pub source: SourceConfig,
    /// Frame sampler settings
    pub sampler: SamplerConfig,
    /// Detection worker settings
    pub worker: WorkerConfig,
    /// AprilTag detector settings, used with the `apriltag` feature
    pub apriltag: AprilTagConfig,
    /// Camera and marker constants
    pub calibration: Calibration,
    /// Steering thresholds
    pub policy: DecisionPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 33,
            target_marker_id: None,
            actuation_endpoint: None,
            connect_timeout_ms: 3000,
            log_filter: "info".to_string(),
            event_capacity: 256,
            source: SourceConfig::default(),
            sampler: SamplerConfig::default(),
            worker: WorkerConfig::default(),
            apriltag: AprilTagConfig::default(),
            calibration: Calibration::default(),
            policy: DecisionPolicy::default(),
        }
    }
}

impl RelayConfig {
    /// Parse configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, RelayError> {
        let config: RelayConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.tick_interval_ms == 0 {
            return Err(RelayError::InvalidConfiguration {
                message: "Tick interval must be > 0".to_string(),
            });
        }

        if self.connect_timeout_ms == 0 {
            return Err(RelayError::InvalidConfiguration {
                message: "Connect timeout must be > 0".to_string(),
            });
        }

        if self.event_capacity == 0 {
            return Err(RelayError::InvalidConfiguration {
                message: "Event capacity must be > 0".to_string(),
            });
        }

        if let Some(endpoint) = &self.actuation_endpoint {
            tagrelay_core::Endpoint::parse(endpoint)?;
        }

        self.sampler.validate()?;
        self.worker.validate()?;
        self.apriltag.validate()?;
        self.calibration.validate()?;
        self.policy.validate()?;
        Ok(())
    }

    /// Sampling period
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Actuation link connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagrelay_media::TagFamily;

    #[test]
    fn test_defaults_are_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval(), Duration::from_millis(33));
        assert_eq!(config.policy.stop_distance_m, 0.6);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RelayConfig::from_json_str(
            r#"{
                "tick_interval_ms": 50,
                "target_marker_id": 3,
                "policy": { "base_power": 200 },
                "worker": { "request_timeout_ms": 250 },
                "apriltag": { "family": "tag25h9" },
                "source": { "camera_index": null }
            }"#,
        )
        .unwrap();
        assert_eq!(config.tick_interval_ms, 50);
        assert_eq!(config.target_marker_id, Some(3));
        assert_eq!(config.policy.base_power, 200);
        assert_eq!(config.policy.turn_delta, 60);
        assert_eq!(config.source.camera_index, None);
        assert_eq!(config.worker.request_timeout_ms, Some(250));
        assert_eq!(config.apriltag.family, TagFamily::Tag25h9);
        assert_eq!(config.apriltag.max_hamming, 1);
        assert_eq!(config.calibration, Calibration::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(RelayConfig::from_json_str(r#"{ "tick_interval_ms": 0 }"#).is_err());
        assert!(RelayConfig::from_json_str(r#"{ "apriltag": { "decimation": 0.0 } }"#).is_err());
        assert!(RelayConfig::from_json_str(r#"{ "actuation_endpoint": "udp://x:1" }"#).is_err());
        assert!(matches!(
            RelayConfig::from_json_str(r#"{ "sampler": { "max_pixels": 0 } }"#),
            Err(RelayError::Media { .. })
        ));
        assert!(matches!(
            RelayConfig::from_json_str("not json"),
            Err(RelayError::Serialization { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            RelayConfig::load("/nonexistent/tagrelay.json"),
            Err(RelayError::Io { .. })
        ));
    }
}
