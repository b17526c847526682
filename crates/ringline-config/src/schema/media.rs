//! Media handoff configuration: credential service and retry budget.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// External media transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Application id presented to the media transport on join.
    pub app_id: String,
    /// Endpoint of the session credential service.
    pub credential_url: String,
    /// Total credential fetch attempts before giving up (valid range: 1-10).
    pub credential_attempts: u32,
    /// First retry delay in milliseconds; doubles per attempt.
    pub credential_base_delay_ms: u32,
    /// Upper bound on a single retry delay in milliseconds.
    pub credential_max_delay_ms: u32,
    /// HTTP request timeout for one credential fetch (valid range: 1-60).
    pub request_timeout_secs: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            credential_url: "http://127.0.0.1:8081/token".into(),
            credential_attempts: 4,
            credential_base_delay_ms: 250,
            credential_max_delay_ms: 4000,
            request_timeout_secs: 10,
        }
    }
}

impl MediaConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.credential_base_delay_ms))
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.credential_max_delay_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.request_timeout_secs))
    }
}
