//! Accept loop: one task per WebSocket connection.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

use crate::connection::{handle_connection, ConnectionSettings};
use crate::relay::SignalingRelay;

/// Accept connections on `listener` forever.
pub async fn serve(listener: TcpListener, relay: SignalingRelay, settings: ConnectionSettings) {
    // Periodic presence summary.
    let registry = relay.registry().clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            let count = registry.count().await;
            tracing::debug!(online = count, "Presence tick");
        }
    });

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let relay = relay.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, relay, settings).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}
