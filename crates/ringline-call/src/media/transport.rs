//! External media transport seam.

use async_trait::async_trait;
use ringline_common::{ChannelId, Identity};
use tokio::sync::mpsc;
use tracing::info;

use super::types::{MediaError, RemoteStreamEvent, StreamId};

/// Everything a transport needs to join one channel.
#[derive(Clone)]
pub struct JoinRequest {
    pub app_id: String,
    pub channel_id: ChannelId,
    pub token: String,
    pub identity: Identity,
}

impl std::fmt::Debug for JoinRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinRequest")
            .field("app_id", &self.app_id)
            .field("channel_id", &self.channel_id)
            .field("token", &"[REDACTED]")
            .field("identity", &self.identity)
            .finish()
    }
}

/// Joins media channels.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    async fn join(&self, request: JoinRequest) -> Result<Box<dyn MediaChannel>, MediaError>;
}

/// A joined channel.
#[async_trait]
pub trait MediaChannel: Send {
    async fn publish_local_audio(&mut self) -> Result<(), MediaError>;

    async fn unpublish_local_audio(&mut self) -> Result<(), MediaError>;

    /// Remote stream changes for this channel. Yields the receiver once.
    fn take_remote_events(&mut self) -> Option<mpsc::Receiver<RemoteStreamEvent>>;

    async fn subscribe(&mut self, stream: &StreamId) -> Result<(), MediaError>;

    async fn unsubscribe(&mut self, stream: &StreamId) -> Result<(), MediaError>;

    async fn leave(&mut self) -> Result<(), MediaError>;
}

// ---------------------------------------------------------------------------
// Signaling-only transport
// ---------------------------------------------------------------------------

/// Transport that carries no audio. Joins and leaves are logged so the
/// call flow can be exercised without a media backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalingOnlyTransport;

#[async_trait]
impl MediaTransport for SignalingOnlyTransport {
    async fn join(&self, request: JoinRequest) -> Result<Box<dyn MediaChannel>, MediaError> {
        info!(
            app_id = %request.app_id,
            channel = %request.channel_id,
            identity = %request.identity,
            "Media join (signaling only)"
        );
        Ok(Box::new(SignalingOnlyChannel {
            channel_id: request.channel_id,
        }))
    }
}

struct SignalingOnlyChannel {
    channel_id: ChannelId,
}

#[async_trait]
impl MediaChannel for SignalingOnlyChannel {
    async fn publish_local_audio(&mut self) -> Result<(), MediaError> {
        info!(channel = %self.channel_id, "Publishing local audio (signaling only)");
        Ok(())
    }

    async fn unpublish_local_audio(&mut self) -> Result<(), MediaError> {
        Ok(())
    }

    fn take_remote_events(&mut self) -> Option<mpsc::Receiver<RemoteStreamEvent>> {
        None
    }

    async fn subscribe(&mut self, stream: &StreamId) -> Result<(), MediaError> {
        info!(channel = %self.channel_id, stream = %stream, "Subscribing (signaling only)");
        Ok(())
    }

    async fn unsubscribe(&mut self, _stream: &StreamId) -> Result<(), MediaError> {
        Ok(())
    }

    async fn leave(&mut self) -> Result<(), MediaError> {
        info!(channel = %self.channel_id, "Media leave (signaling only)");
        Ok(())
    }
}
