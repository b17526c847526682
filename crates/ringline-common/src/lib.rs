//! Types shared by the ringline relay server and call clients.

pub mod errors;
pub mod id;
pub mod protocol;

pub use errors::{ConfigError, ProtocolError, RinglineError};
pub use id::{new_id, ChannelId, Identity};
pub use protocol::{
    reasons, ClientControl, ClientFrame, MessageKind, ServerControl, ServerFrame, SignalingMessage,
};

pub type Result<T> = std::result::Result<T, RinglineError>;
