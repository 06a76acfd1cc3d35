//! Coordinator settings shared by the binary and the integration tests.

use std::time::Duration;

/// Tunables for room lifecycle and code execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// How long an empty room survives before its state is discarded.
    pub grace_period: Duration,
    /// Run `execute-code` on the server instead of waiting for client results.
    pub server_execution: bool,
    /// Upper bound for one server-side execution.
    pub execution_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(100),
            server_execution: false,
            execution_timeout: Duration::from_secs(5),
        }
    }
}
