//! Engine tuning knobs that are not part of the caller's settings blob.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the discovery and streaming engine.
///
/// # Example
/// ```rust
/// use sqlpub_core::config::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig::default()
///     .with_max_connections(4)
///     .with_count_budget(Duration::from_millis(500));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on pooled connections, and so on concurrent discovery units
    pub max_connections: u32,
    /// How long a unit may wait for a pooled connection
    pub acquire_timeout: Duration,
    /// Time allowed for an exact row count before reporting it unavailable
    pub count_budget: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            count_budget: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    /// Validates engine configuration parameters.
    ///
    /// # Errors
    /// Returns error if configuration values are invalid or unsafe
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_connections == 0 {
            return Err(crate::error::ConnectorError::configuration(
                "max_connections must be greater than 0",
            ));
        }

        if self.max_connections > 100 {
            return Err(crate::error::ConnectorError::configuration(
                "max_connections should not exceed 100",
            ));
        }

        if self.acquire_timeout.is_zero() {
            return Err(crate::error::ConnectorError::configuration(
                "acquire_timeout must be greater than 0",
            ));
        }

        if self.count_budget.is_zero() {
            return Err(crate::error::ConnectorError::configuration(
                "count_budget must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Builder method to set the pool size.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Builder method to set the pool acquire timeout.
    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    /// Builder method to set the count budget.
    pub fn with_count_budget(mut self, count_budget: Duration) -> Self {
        self.count_budget = count_budget;
        self
    }
}
