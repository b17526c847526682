//! Per-connection handler: register, then relay signaling frames.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use ringline_common::{ClientControl, ClientFrame, Identity, ServerControl, ServerFrame};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::presence::ConnectionRef;
use crate::relay::{Origin, RelayOutcome, SignalingRelay};

type WsStream = WebSocketStream<tokio::net::TcpStream>;
type WsSink = futures_util::stream::SplitSink<WsStream, Message>;
type WsSource = futures_util::stream::SplitStream<WsStream>;

/// Per-connection limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub register_timeout: Duration,
    pub outbound_buffer: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            register_timeout: Duration::from_secs(10),
            outbound_buffer: 256,
        }
    }
}

/// Handle a single WebSocket connection.
pub async fn handle_connection(
    ws: WsStream,
    addr: SocketAddr,
    relay: SignalingRelay,
    settings: ConnectionSettings,
) {
    let (mut sink, mut stream) = ws.split();

    // 1. The first frame must register an identity.
    let identity = match read_register(&mut stream, addr, settings.register_timeout).await {
        Ok(identity) => identity,
        Err(message) => {
            let _ = send_frame(&mut sink, &ServerFrame::error(message)).await;
            return;
        }
    };

    // 2. Create our receive channel and register, replacing any older entry.
    let (tx, mut rx) = mpsc::channel::<String>(settings.outbound_buffer);
    let connection = ConnectionRef::new(tx);
    let origin = Origin {
        identity: identity.clone(),
        connection: connection.id(),
    };

    if let Some(stale) = relay.registry().register(&identity, connection.clone()).await {
        let _ = stale.try_deliver(ServerFrame::error("registration superseded").to_json());
    }

    tracing::info!(peer = %addr, identity = %identity, "Client registered");

    // 3. Confirm.
    let registered = ServerFrame::Control(ServerControl::Registered {
        identity: identity.clone(),
    });
    if send_frame(&mut sink, &registered).await.is_err() {
        relay.registry().unregister(&connection).await;
        return;
    }

    // 4. Tell the newcomer who was already online.
    for other in relay.registry().online().await {
        if other == identity {
            continue;
        }
        let frame = ServerFrame::Control(ServerControl::PresenceOnline { identity: other });
        if send_frame(&mut sink, &frame).await.is_err() {
            relay.registry().unregister(&connection).await;
            return;
        }
    }

    // 5. Forwarding loop.
    loop {
        tokio::select! {
            // Frames queued for this client → its WebSocket.
            Some(text) = rx.recv() => {
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            // Frames from this client → relay.
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text(&relay, &origin, text.as_str()).await;
                        if let Some(reply) = reply {
                            if send_frame(&mut sink, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // 6. Cleanup. Only removes the entry if it is still ours.
    tracing::info!(peer = %addr, identity = %identity, "Client disconnected");
    relay.registry().unregister(&connection).await;
}

/// Process one text frame from a registered client. Returns the frame to
/// send back to that client, if any.
async fn handle_text(relay: &SignalingRelay, origin: &Origin, text: &str) -> Option<ServerFrame> {
    match ClientFrame::parse(text) {
        Ok(ClientFrame::Signal(message)) => match relay.relay(origin, &message, text).await {
            RelayOutcome::Forwarded => None,
            RelayOutcome::Failed(failed) => Some(ServerFrame::Signal(failed)),
            RelayOutcome::Rejected(reason) => Some(ServerFrame::error(reason)),
        },
        Ok(ClientFrame::Control(ClientControl::Register { .. })) => {
            Some(ServerFrame::error("already registered"))
        }
        Err(e) => {
            tracing::debug!(identity = %origin.identity, error = %e, "Dropping malformed frame");
            Some(ServerFrame::error(e.to_string()))
        }
    }
}

/// Read and parse the first message as a `register` frame.
async fn read_register(
    stream: &mut WsSource,
    addr: SocketAddr,
    deadline: Duration,
) -> Result<Identity, String> {
    let frame = tokio::time::timeout(deadline, stream.next()).await;

    match frame {
        Ok(Some(Ok(Message::Text(text)))) => match ClientFrame::parse(text.as_str()) {
            Ok(ClientFrame::Control(ClientControl::Register { identity })) => {
                if identity.is_empty() {
                    tracing::warn!(peer = %addr, "Blank identity in register");
                    Err("identity must not be empty".into())
                } else {
                    Ok(identity)
                }
            }
            Ok(ClientFrame::Signal(_)) => {
                tracing::warn!(peer = %addr, "Signaling before register");
                Err("not registered".into())
            }
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "Invalid register message");
                Err(e.to_string())
            }
        },
        Ok(Some(Ok(_))) => {
            tracing::warn!(peer = %addr, "Expected text register, got binary");
            Err("expected register".into())
        }
        Ok(Some(Err(e))) => {
            tracing::warn!(peer = %addr, error = %e, "WS error during register");
            Err(e.to_string())
        }
        Ok(None) => {
            tracing::debug!(peer = %addr, "Connection closed before register");
            Err("closed".into())
        }
        Err(_) => {
            tracing::warn!(peer = %addr, timeout = ?deadline, "Register timeout");
            Err("register timeout".into())
        }
    }
}

/// Send a `ServerFrame` as a JSON text frame.
async fn send_frame(
    sink: &mut WsSink,
    frame: &ServerFrame,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    sink.send(Message::Text(frame.to_json().into())).await
}
