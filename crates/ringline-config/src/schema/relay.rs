use serde::{Deserialize, Serialize};

/// Relay server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address to bind the WebSocket listener on.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Seconds a new connection has to send `register` (valid range: 1-120).
    pub register_timeout_secs: u32,
    /// Outbound frames buffered per connection before sends are dropped
    /// (valid range: 8-65536).
    pub outbound_buffer: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            register_timeout_secs: 10,
            outbound_buffer: 256,
        }
    }
}

impl RelayConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn register_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.register_timeout_secs))
    }
}
