//! In-memory transport and credential fakes that record every call.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use ringline_common::{ChannelId, Identity};
use tokio::sync::{mpsc, Notify};

use super::credentials::CredentialService;
use super::transport::{JoinRequest, MediaChannel, MediaTransport};
use super::types::{CredentialError, MediaError, RemoteStreamEvent, SessionCredential, StreamId};

pub(crate) type OpLog = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    pub(crate) ops: OpLog,
    /// When set, `join` waits for one `notify_one` before completing.
    pub(crate) gate: Option<Arc<Notify>>,
    pub(crate) fail_join: bool,
    pub(crate) fail_publish: bool,
    pub(crate) fail_leave: bool,
    remote: Arc<Mutex<Option<mpsc::Sender<RemoteStreamEvent>>>>,
}

impl FakeTransport {
    pub(crate) fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let transport = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (transport, gate)
    }

    pub(crate) fn refusing() -> Self {
        Self {
            fail_join: true,
            ..Self::default()
        }
    }

    /// Joins, but refuses to publish local audio.
    pub(crate) fn muted() -> Self {
        Self {
            fail_publish: true,
            ..Self::default()
        }
    }

    /// Joins and publishes, but reports an error on leave.
    pub(crate) fn sticky() -> Self {
        Self {
            fail_leave: true,
            ..Self::default()
        }
    }

    pub(crate) fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, op: &str) -> usize {
        self.ops().iter().filter(|o| o.starts_with(op)).count()
    }

    /// Sender for remote stream events on the most recently joined channel.
    pub(crate) fn remote(&self) -> Option<mpsc::Sender<RemoteStreamEvent>> {
        self.remote.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaTransport for FakeTransport {
    async fn join(&self, request: JoinRequest) -> Result<Box<dyn MediaChannel>, MediaError> {
        self.ops
            .lock()
            .unwrap()
            .push(format!("join:{}", request.channel_id));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_join {
            return Err(MediaError::Join("refused".into()));
        }
        let (tx, rx) = mpsc::channel(8);
        *self.remote.lock().unwrap() = Some(tx);
        Ok(Box::new(FakeChannel {
            ops: Arc::clone(&self.ops),
            remote: Some(rx),
            fail_publish: self.fail_publish,
            fail_leave: self.fail_leave,
        }))
    }
}

struct FakeChannel {
    ops: OpLog,
    remote: Option<mpsc::Receiver<RemoteStreamEvent>>,
    fail_publish: bool,
    fail_leave: bool,
}

#[async_trait]
impl MediaChannel for FakeChannel {
    async fn publish_local_audio(&mut self) -> Result<(), MediaError> {
        self.ops.lock().unwrap().push("publish".into());
        if self.fail_publish {
            return Err(MediaError::Publish("no microphone".into()));
        }
        Ok(())
    }

    async fn unpublish_local_audio(&mut self) -> Result<(), MediaError> {
        self.ops.lock().unwrap().push("unpublish".into());
        Ok(())
    }

    fn take_remote_events(&mut self) -> Option<mpsc::Receiver<RemoteStreamEvent>> {
        self.remote.take()
    }

    async fn subscribe(&mut self, stream: &StreamId) -> Result<(), MediaError> {
        self.ops.lock().unwrap().push(format!("subscribe:{stream}"));
        Ok(())
    }

    async fn unsubscribe(&mut self, stream: &StreamId) -> Result<(), MediaError> {
        self.ops.lock().unwrap().push(format!("unsubscribe:{stream}"));
        Ok(())
    }

    async fn leave(&mut self) -> Result<(), MediaError> {
        self.ops.lock().unwrap().push("leave".into());
        if self.fail_leave {
            return Err(MediaError::Leave("transport gone".into()));
        }
        Ok(())
    }
}

/// Credential service that answers from a fixed outcome.
#[derive(Clone)]
pub(crate) struct FakeCredentials {
    pub(crate) outcome: Result<(), CredentialError>,
    pub(crate) gate: Option<Arc<Notify>>,
    pub(crate) requests: Arc<Mutex<u32>>,
}

impl Default for FakeCredentials {
    fn default() -> Self {
        Self {
            outcome: Ok(()),
            gate: None,
            requests: Arc::new(Mutex::new(0)),
        }
    }
}

impl FakeCredentials {
    pub(crate) fn failing(error: CredentialError) -> Self {
        Self {
            outcome: Err(error),
            ..Self::default()
        }
    }

    pub(crate) fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let credentials = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (credentials, gate)
    }

    pub(crate) fn requests(&self) -> u32 {
        *self.requests.lock().unwrap()
    }
}

#[async_trait]
impl CredentialService for FakeCredentials {
    async fn request(
        &self,
        channel_id: &ChannelId,
        _identity: &Identity,
    ) -> Result<SessionCredential, CredentialError> {
        *self.requests.lock().unwrap() += 1;
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.outcome.clone().map(|()| SessionCredential {
            token: format!("token-{channel_id}"),
            expires_at: Utc::now() + chrono::Duration::minutes(10),
        })
    }
}
