//! Structured logging setup

use tagrelay_core::RelayError;
use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor the configuration sets one
pub const DEFAULT_FILTER: &str = "info";

/// Installs the global tracing subscriber
#[derive(Debug, Clone)]
pub struct DebugLogger {
    filter: String,
}

impl DebugLogger {
    /// Logger with the given fallback filter directive
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
        }
    }

    /// Filter in effect: `RUST_LOG` when set, the configured directive otherwise
    pub fn env_filter(&self) -> Result<EnvFilter, RelayError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.filter).map_err(|e| RelayError::InvalidConfiguration {
            message: format!("invalid log filter '{}': {}", self.filter, e),
        })
    }

    /// Install a fmt subscriber
    ///
    /// Returns `false` when a global subscriber was already installed, which
    /// is not an error.
    pub fn init(&self) -> Result<bool, RelayError> {
        let filter = self.env_filter()?;
        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok();
        if installed {
            tracing::debug!("Logging initialized");
        }
        Ok(installed)
    }
}

impl Default for DebugLogger {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER)
    }
}

/// Initialize logging with `filter` as the fallback directive
pub fn init_logging(filter: &str) -> Result<bool, RelayError> {
    DebugLogger::new(filter).init()
}
