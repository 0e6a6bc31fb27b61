//! Resource manager configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Resource manager configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceManagerConfig {
    /// Slots reserved up front in the operation pool
    pub initial_pool_capacity: usize,
    /// Upper bound for [`ResourceManager::wait_for_completion`](crate::ResourceManager::wait_for_completion)
    pub wait_timeout_ms: u64,
    /// Log failed operations when no exception handler is installed
    pub log_exceptions: bool,
}

impl ResourceManagerConfig {
    /// Wait timeout as a duration
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        Self {
            initial_pool_capacity: 64,
            wait_timeout_ms: 10_000,
            log_exceptions: true,
        }
    }
}
