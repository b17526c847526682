//! ringline-relay: presence registry and signaling relay.
//!
//! Accepts WebSocket connections, binds each to the identity it registers,
//! and forwards call-lifecycle messages to the target identity's live
//! connection. The relay never tracks call state; it only resolves
//! targets and reports unreachable ones with `failed`.

pub mod connection;
pub mod presence;
pub mod relay;
pub mod server;

pub use connection::ConnectionSettings;
pub use presence::{ConnectionId, ConnectionRef, DeliveryError, PresenceEntry, PresenceRegistry};
pub use relay::{Origin, RelayOutcome, SignalingRelay};
pub use server::serve;
