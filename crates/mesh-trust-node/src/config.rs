//! Runtime configuration.

use std::time::Duration;

use mesh_trust::TrustConfig;
use serde::{Deserialize, Serialize};

use crate::error::{NodeError, NodeResult};

/// Default reputation broadcast period.
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(15);

/// Default command and inbound queue depth.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Configuration for a running node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Trust controller settings.
    pub trust: TrustConfig,
    /// Period between reputation advertisements.
    pub broadcast_interval: Duration,
    /// Bound on queued commands and inbound advertisements.
    pub mailbox_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            trust: TrustConfig::default(),
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

impl NodeConfig {
    /// Create a configuration around the given trust settings.
    #[must_use]
    pub fn new(trust: TrustConfig) -> Self {
        Self {
            trust,
            ..Self::default()
        }
    }

    /// Set the broadcast interval.
    #[must_use]
    pub const fn with_broadcast_interval(mut self, interval: Duration) -> Self {
        self.broadcast_interval = interval;
        self
    }

    /// Set the mailbox capacity.
    #[must_use]
    pub const fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> NodeResult<()> {
        self.trust.validate()?;
        if self.broadcast_interval.is_zero() {
            return Err(NodeError::InvalidConfig(
                "broadcast_interval must be positive".into(),
            ));
        }
        if self.mailbox_capacity == 0 {
            return Err(NodeError::InvalidConfig(
                "mailbox_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.broadcast_interval, Duration::from_secs(15));
        assert_eq!(config.mailbox_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = NodeConfig::new(TrustConfig::builder().batch_size(3).build())
            .with_broadcast_interval(Duration::from_millis(500))
            .with_mailbox_capacity(8);

        assert_eq!(config.trust.batch_size, 3);
        assert_eq!(config.broadcast_interval, Duration::from_millis(500));
        assert_eq!(config.mailbox_capacity, 8);
    }

    #[test]
    fn test_validate() {
        let config = NodeConfig::default().with_broadcast_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(NodeError::InvalidConfig(_))));

        let config = NodeConfig::default().with_mailbox_capacity(0);
        assert!(config.validate().is_err());

        let config = NodeConfig::new(TrustConfig::builder().transmission_size(0).build());
        assert!(matches!(config.validate(), Err(NodeError::Trust(_))));
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = NodeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: NodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
