//! Background relay connection loop with auto-reconnect.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use ringline_common::{ClientFrame, ServerControl, ServerFrame};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use super::types::{SignalingCommand, SignalingConfig, SignalingEvent};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// How a connected session ended.
enum SessionEnd {
    /// Socket dropped; reconnect.
    Lost,
    /// Disconnect requested or client handle dropped; stop.
    Shutdown,
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

/// Background task managing the relay connection with auto-reconnect.
pub(crate) async fn connection_loop(
    config: SignalingConfig,
    connected: Arc<RwLock<bool>>,
    event_tx: mpsc::Sender<SignalingEvent>,
    mut command_rx: mpsc::Receiver<SignalingCommand>,
) {
    let mut reconnect_delay = config.reconnect_delay_secs.max(1);

    loop {
        info!(url = %config.relay_url, identity = %config.identity, "Connecting to relay");

        match tokio::time::timeout(
            CONNECT_TIMEOUT,
            tokio_tungstenite::connect_async(config.relay_url.as_str()),
        )
        .await
        {
            Ok(Ok((ws_stream, _))) => {
                reconnect_delay = config.reconnect_delay_secs.max(1);
                *connected.write().await = true;
                let _ = event_tx.send(SignalingEvent::Connected).await;

                let end = run_session(ws_stream, &config, &event_tx, &mut command_rx).await;

                *connected.write().await = false;
                let _ = event_tx.send(SignalingEvent::Disconnected).await;
                if matches!(end, SessionEnd::Shutdown) {
                    info!("Signaling client shut down");
                    return;
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to connect to relay");
                let _ = event_tx
                    .send(SignalingEvent::Error(format!("Connection failed: {e}")))
                    .await;
            }
            Err(_elapsed) => {
                error!("Relay connection timed out after 15s");
                let _ = event_tx
                    .send(SignalingEvent::Error(
                        "Connection timed out after 15s".to_string(),
                    ))
                    .await;
            }
        }

        // Exponential backoff reconnect. Nothing can be sent meanwhile.
        info!(delay = reconnect_delay, "Reconnecting in {} seconds", reconnect_delay);
        let sleep = tokio::time::sleep(Duration::from_secs(reconnect_delay));
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                cmd = command_rx.recv() => match cmd {
                    Some(SignalingCommand::Send(message)) => {
                        warn!(
                            kind = %message.kind(),
                            to = %message.to(),
                            channel = %message.channel_id(),
                            "Not connected; dropping outbound signal"
                        );
                    }
                    Some(SignalingCommand::Disconnect) | None => return,
                },
            }
        }
        reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay_secs.max(1));
    }
}

async fn run_session(
    ws_stream: WsStream,
    config: &SignalingConfig,
    event_tx: &mpsc::Sender<SignalingEvent>,
    command_rx: &mut mpsc::Receiver<SignalingCommand>,
) -> SessionEnd {
    let (mut ws_write, mut ws_read) = ws_stream.split();

    // Register (again, after a reconnect).
    let register = ClientFrame::register(config.identity.clone()).to_json();
    if ws_write.send(WsMessage::Text(register.into())).await.is_err() {
        return SessionEnd::Lost;
    }

    let mut heartbeat =
        tokio::time::interval(Duration::from_secs(config.heartbeat_interval_secs.max(1)));
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if ws_write.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                    return SessionEnd::Lost;
                }
            }

            cmd = command_rx.recv() => match cmd {
                Some(SignalingCommand::Send(message)) => {
                    debug!(
                        kind = %message.kind(),
                        to = %message.to(),
                        channel = %message.channel_id(),
                        "Sending signal"
                    );
                    if ws_write.send(WsMessage::Text(message.to_json().into())).await.is_err() {
                        return SessionEnd::Lost;
                    }
                }
                Some(SignalingCommand::Disconnect) | None => {
                    let _ = ws_write.send(WsMessage::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
            },

            frame = ws_read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    handle_frame(text.as_str(), event_tx).await;
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Relay closed connection");
                    return SessionEnd::Lost;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    return SessionEnd::Lost;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Translate one relay frame into an event.
async fn handle_frame(text: &str, event_tx: &mpsc::Sender<SignalingEvent>) {
    let event = match ServerFrame::parse(text) {
        Ok(ServerFrame::Signal(message)) => SignalingEvent::Signal(message),
        Ok(ServerFrame::Control(ServerControl::Registered { identity })) => {
            info!(identity = %identity, "Registered with relay");
            SignalingEvent::Registered(identity)
        }
        Ok(ServerFrame::Control(ServerControl::PresenceOnline { identity })) => {
            SignalingEvent::PresenceOnline(identity)
        }
        Ok(ServerFrame::Control(ServerControl::PresenceOffline { identity })) => {
            SignalingEvent::PresenceOffline(identity)
        }
        Ok(ServerFrame::Control(ServerControl::Error { message })) => {
            warn!(message = %message, "Relay error");
            SignalingEvent::ServerError(message)
        }
        Err(e) => {
            debug!(error = %e, "Unrecognized frame from relay");
            return;
        }
    };
    let _ = event_tx.send(event).await;
}
