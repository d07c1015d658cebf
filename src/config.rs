//! Process-level configuration for a [`crate::manager::HubLifetimeManager`].
//!
//! Following the convention the rest of this codebase uses for its services:
//! environment variables are only ever read once, at the edge
//! (`ManagerConfig::from_env`), and everything past that point is an
//! explicit struct field.

use std::env;
use std::time::Duration;

const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub hub_type_name: String,
    pub ack_timeout: Duration,
    pub broker_endpoints: Vec<String>,
}

impl ManagerConfig {
    pub fn new(hub_type_name: impl Into<String>) -> Self {
        Self {
            hub_type_name: hub_type_name.into(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            broker_endpoints: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_broker_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.broker_endpoints = endpoints;
        self
    }

    /// Reads `HUB_TYPE_NAME`, `HUB_ACK_TIMEOUT_MS`, and
    /// `HUB_BROKER_ENDPOINTS` (comma-separated), falling back to explicit
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let hub_type_name =
            env::var("HUB_TYPE_NAME").unwrap_or_else(|_| "DefaultHub".to_owned());
        let ack_timeout = env::var("HUB_ACK_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_ACK_TIMEOUT);
        let broker_endpoints = env::var("HUB_BROKER_ENDPOINTS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            hub_type_name,
            ack_timeout,
            broker_endpoints,
        }
    }
}
