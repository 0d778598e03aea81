//! Registry configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::telemetry::Telemetry;

/// Process-wide capacity and behavior limits, set once at registry
/// construction.
#[derive(Clone)]
pub struct RegistryConfig {
    /// Maximum listeners per subject bucket (literal patterns only; the
    /// global scan list is bounded by the total cap alone).
    pub max_listeners_per_pattern: usize,
    /// Maximum listeners across the whole registry.
    pub max_total_listeners: usize,
    /// Handler timeout applied when a listener sets none.
    pub default_timeout: Duration,
    /// Regex admission cap, in metacharacter count.
    pub max_regex_complexity: usize,
    /// Optional observer for emission and handler lifecycle.
    pub telemetry: Option<Arc<dyn Telemetry>>,
}

impl RegistryConfig {
    /// Defaults: 100 listeners per pattern, 1000 total, 5 second timeout,
    /// regex complexity cap of 25, no telemetry.
    pub fn new() -> Self {
        Self {
            max_listeners_per_pattern: 100,
            max_total_listeners: 1000,
            default_timeout: Duration::from_secs(5),
            max_regex_complexity: 25,
            telemetry: None,
        }
    }

    /// Attach a telemetry observer.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("max_listeners_per_pattern", &self.max_listeners_per_pattern)
            .field("max_total_listeners", &self.max_total_listeners)
            .field("default_timeout", &self.default_timeout)
            .field("max_regex_complexity", &self.max_regex_complexity)
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}
