//! Public handle for the relay connection.

use std::sync::Arc;

use ringline_common::SignalingMessage;
use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use super::connection::connection_loop;
use super::types::{SignalingCommand, SignalingConfig, SignalingEvent};

/// Outbound half of signaling as the call controller sees it.
///
/// Fire-and-forget: delivery problems come back as `failed` or not at all.
pub trait SignalSink: Send + Sync {
    fn send(&self, message: SignalingMessage);
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle for the background relay connection.
///
/// All methods are non-blocking and send commands to the connection task.
#[derive(Clone)]
pub struct SignalingClient {
    command_tx: mpsc::Sender<SignalingCommand>,
    connected: Arc<RwLock<bool>>,
}

impl SignalingClient {
    /// Start the background connection.
    /// Returns `(client, event_receiver)`.
    pub fn connect(config: SignalingConfig) -> (Self, mpsc::Receiver<SignalingEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);
        let connected = Arc::new(RwLock::new(false));

        let client = Self {
            command_tx,
            connected: Arc::clone(&connected),
        };

        tokio::spawn(connection_loop(config, connected, event_tx, command_rx));

        (client, event_rx)
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Close the connection and stop reconnecting.
    pub async fn disconnect(&self) {
        let _ = self.command_tx.send(SignalingCommand::Disconnect).await;
    }
}

impl SignalSink for SignalingClient {
    fn send(&self, message: SignalingMessage) {
        if let Err(e) = self.command_tx.try_send(SignalingCommand::Send(message)) {
            warn!(error = %e, "Signaling queue unavailable; dropping outbound signal");
        }
    }
}
