//! Credential, stream, and event types for the media adapter.

use chrono::{DateTime, Utc};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Short-lived token authorizing one identity to join one media channel.
#[derive(Clone, Deserialize)]
pub struct SessionCredential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionCredential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// Worth retrying: network failure, 5xx, rate limiting.
    #[error("transient credential error: {0}")]
    Transient(String),

    /// Retrying will not help: rejected request or unreadable response.
    #[error("credential request rejected: {0}")]
    Terminal(String),

    #[error("credential retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl CredentialError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CredentialError::Transient(_))
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("join failed: {0}")]
    Join(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("leave failed: {0}")]
    Leave(String),
}

/// Opaque id the transport assigns to a remote stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub String);

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote stream changes reported by a joined channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStreamEvent {
    Added(StreamId),
    Removed(StreamId),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Media progress for the UI. None of these end the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    CredentialRetry { attempt: u32 },
    /// Joined and publishing local audio.
    Connected,
    RemoteStreamAdded(StreamId),
    RemoteStreamRemoved(StreamId),
    /// Media could not be established; the call continues signaling-only.
    Error(String),
    Disconnected,
}
