//! Configuration, events, and commands for the signaling client.

use ringline_common::{Identity, SignalingMessage};
use ringline_config::ClientConfig;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Relay WebSocket URL, e.g. `ws://127.0.0.1:8080`.
    pub relay_url: String,
    pub identity: Identity,
    /// Reconnect base delay in seconds.
    pub reconnect_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub max_reconnect_delay_secs: u64,
    /// WebSocket ping interval in seconds.
    pub heartbeat_interval_secs: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:8080".into(),
            identity: Identity::default(),
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
            heartbeat_interval_secs: 25,
        }
    }
}

impl SignalingConfig {
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            relay_url: config.relay_url.clone(),
            identity: Identity::new(config.identity.clone()),
            reconnect_delay_secs: u64::from(config.reconnect_delay_secs),
            max_reconnect_delay_secs: u64::from(config.max_reconnect_delay_secs),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Events / commands
// ---------------------------------------------------------------------------

/// Events from the relay connection.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalingEvent {
    /// Socket open; registration sent.
    Connected,
    Registered(Identity),
    Signal(SignalingMessage),
    PresenceOnline(Identity),
    PresenceOffline(Identity),
    /// `error` frame from the relay.
    ServerError(String),
    Disconnected,
    /// Connection attempt failed.
    Error(String),
}

#[derive(Debug)]
pub(crate) enum SignalingCommand {
    Send(SignalingMessage),
    Disconnect,
}
