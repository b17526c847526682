use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Call lifecycle policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Seconds a call may ring before it ends with "no answer"
    /// (valid range: 5-300).
    pub ring_timeout_secs: u32,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ring_timeout_secs: 45,
        }
    }
}

impl CallConfig {
    pub fn ring_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.ring_timeout_secs))
    }
}
