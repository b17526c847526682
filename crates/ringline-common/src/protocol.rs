//! Wire protocol shared by the relay server and call clients.
//!
//! Every frame is a JSON text frame tagged by `type`. Call-lifecycle
//! messages (`SignalingMessage`) travel unchanged in both directions; the
//! connection-control frames differ per direction.

use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;
use crate::id::{ChannelId, Identity};

// ---------------------------------------------------------------------------
// Reasons
// ---------------------------------------------------------------------------

/// Reason strings carried by `decline`, `end` and `failed`.
pub mod reasons {
    pub const TARGET_UNAVAILABLE: &str = "target unavailable";
    pub const BUSY: &str = "busy";
    pub const NO_ANSWER: &str = "no answer";
    pub const DECLINED: &str = "declined";
}

// ---------------------------------------------------------------------------
// Signaling messages
// ---------------------------------------------------------------------------

/// Discriminant of a `SignalingMessage`, handy for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Invite,
    Accept,
    Decline,
    End,
    Failed,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageKind::Invite => "invite",
            MessageKind::Accept => "accept",
            MessageKind::Decline => "decline",
            MessageKind::End => "end",
            MessageKind::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One immutable, fire-and-forget call-lifecycle message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalingMessage {
    Invite {
        from: Identity,
        to: Identity,
        channel_id: ChannelId,
        caller_display_name: String,
    },
    Accept {
        from: Identity,
        to: Identity,
        channel_id: ChannelId,
    },
    Decline {
        from: Identity,
        to: Identity,
        channel_id: ChannelId,
        reason: String,
    },
    End {
        from: Identity,
        to: Identity,
        channel_id: ChannelId,
        duration_seconds: u64,
        /// Set when the caller gave up ringing (`"no answer"`); absent for a
        /// hang-up or cancel.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Relay-originated; never sent by a client.
    Failed {
        to: Identity,
        channel_id: ChannelId,
        reason: String,
    },
}

impl SignalingMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            SignalingMessage::Invite { .. } => MessageKind::Invite,
            SignalingMessage::Accept { .. } => MessageKind::Accept,
            SignalingMessage::Decline { .. } => MessageKind::Decline,
            SignalingMessage::End { .. } => MessageKind::End,
            SignalingMessage::Failed { .. } => MessageKind::Failed,
        }
    }

    /// Sender identity; `None` for relay-originated `failed`.
    pub fn from(&self) -> Option<&Identity> {
        match self {
            SignalingMessage::Invite { from, .. }
            | SignalingMessage::Accept { from, .. }
            | SignalingMessage::Decline { from, .. }
            | SignalingMessage::End { from, .. } => Some(from),
            SignalingMessage::Failed { .. } => None,
        }
    }

    pub fn to(&self) -> &Identity {
        match self {
            SignalingMessage::Invite { to, .. }
            | SignalingMessage::Accept { to, .. }
            | SignalingMessage::Decline { to, .. }
            | SignalingMessage::End { to, .. }
            | SignalingMessage::Failed { to, .. } => to,
        }
    }

    pub fn channel_id(&self) -> &ChannelId {
        match self {
            SignalingMessage::Invite { channel_id, .. }
            | SignalingMessage::Accept { channel_id, .. }
            | SignalingMessage::Decline { channel_id, .. }
            | SignalingMessage::End { channel_id, .. }
            | SignalingMessage::Failed { channel_id, .. } => channel_id,
        }
    }

    /// Build the relay's answer to a message it could not deliver.
    pub fn failed_reply(&self, reason: &str) -> Option<SignalingMessage> {
        let from = self.from()?;
        Some(SignalingMessage::Failed {
            to: from.clone(),
            channel_id: self.channel_id().clone(),
            reason: reason.to_string(),
        })
    }

    pub fn to_json(&self) -> String {
        // A plain enum of strings and integers cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Connection frames
// ---------------------------------------------------------------------------

/// Control frames a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientControl {
    /// Sent once per connection, before any signaling.
    Register { identity: Identity },
}

/// Anything a client may put on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientFrame {
    Control(ClientControl),
    Signal(SignalingMessage),
}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    pub fn register(identity: Identity) -> Self {
        ClientFrame::Control(ClientControl::Register { identity })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Control frames the relay sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerControl {
    Registered { identity: Identity },
    PresenceOnline { identity: Identity },
    PresenceOffline { identity: Identity },
    Error { message: String },
}

/// Anything the relay may put on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Control(ServerControl),
    Signal(SignalingMessage),
}

impl ServerFrame {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Control(ServerControl::Error {
            message: message.into(),
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
