//! Delivery configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::queue::QueuePolicy;

/// Timing and bounds for outbound page commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Interval between retry sweeps in milliseconds
    #[serde(rename = "sweep-interval-ms", default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Entries younger than this are left alone by the periodic sweep
    #[serde(rename = "min-age-ms", default = "default_min_age_ms")]
    pub min_age_ms: u64,

    /// Entries this old are discarded instead of retried
    #[serde(rename = "expiry-ms", default = "default_expiry_ms")]
    pub expiry_ms: u64,

    /// Attempt ceiling per entry
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pending entries kept per destination
    #[serde(rename = "max-pending", default = "default_max_pending")]
    pub max_pending: usize,

    /// Call-site timeout for one outbound send
    #[serde(rename = "send-timeout-ms", default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Wait after audio starts before pushing volume state
    #[serde(rename = "settle-delay-ms", default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_sweep_interval_ms() -> u64 {
    2000
}

fn default_min_age_ms() -> u64 {
    1000
}

fn default_expiry_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_pending() -> usize {
    10
}

fn default_send_timeout_ms() -> u64 {
    1500
}

fn default_settle_delay_ms() -> u64 {
    500
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval_ms(),
            min_age_ms: default_min_age_ms(),
            expiry_ms: default_expiry_ms(),
            max_attempts: default_max_attempts(),
            max_pending: default_max_pending(),
            send_timeout_ms: default_send_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl DeliveryConfig {
    /// Get sweep interval as Duration, never zero
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    /// Get send timeout as Duration
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Get settle delay as Duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Queue bounds derived from this config
    pub fn policy(&self) -> QueuePolicy {
        QueuePolicy {
            max_pending: self.max_pending,
            min_age: Duration::from_millis(self.min_age_ms),
            expiry: Duration::from_millis(self.expiry_ms),
            max_attempts: self.max_attempts,
        }
    }
}
