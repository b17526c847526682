//! Call client configuration: who we are and where the relay lives.

use serde::{Deserialize, Serialize};

/// Connection settings for a call client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the relay server.
    pub relay_url: String,
    /// Identity to register with (e.g. a phone number).
    pub identity: String,
    /// Name shown to callees in the incoming-call UI.
    pub display_name: String,
    /// Reconnect delay (base) in seconds.
    pub reconnect_delay_secs: u32,
    /// Maximum reconnect delay in seconds.
    pub max_reconnect_delay_secs: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:8080".into(),
            identity: String::new(),
            display_name: String::new(),
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
        }
    }
}
