//! Per-call media handoff: credential, join, publish, and teardown.

use std::collections::BTreeSet;
use std::sync::Arc;

use ringline_common::{ChannelId, Identity};
use ringline_config::MediaConfig;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::credentials::{fetch_with_retry, CredentialService, RetryPolicy};
use super::transport::{JoinRequest, MediaChannel, MediaTransport};
use super::types::{MediaError, MediaEvent, RemoteStreamEvent, StreamId};

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MediaSettings {
    pub app_id: String,
    pub retry: RetryPolicy,
}

impl MediaSettings {
    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            app_id: config.app_id.clone(),
            retry: RetryPolicy::from_config(config),
        }
    }
}

/// Starts media sessions against one credential service and transport.
#[derive(Clone)]
pub struct MediaAdapter {
    credentials: Arc<dyn CredentialService>,
    transport: Arc<dyn MediaTransport>,
    settings: MediaSettings,
}

impl MediaAdapter {
    pub fn new(
        credentials: Arc<dyn CredentialService>,
        transport: Arc<dyn MediaTransport>,
        settings: MediaSettings,
    ) -> Self {
        Self {
            credentials,
            transport,
            settings,
        }
    }

    /// Begin connecting media for `channel_id` in the background.
    pub fn start(
        &self,
        channel_id: ChannelId,
        identity: Identity,
        events: mpsc::Sender<MediaEvent>,
    ) -> MediaSession {
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState {
                phase: MediaPhase::FetchingCredential,
                channel: None,
                forwarder: None,
                remote_streams: BTreeSet::new(),
            }),
            events,
        });

        tokio::spawn(connect(
            Arc::clone(&shared),
            self.clone(),
            channel_id.clone(),
            identity,
        ));

        MediaSession { channel_id, shared }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaPhase {
    FetchingCredential,
    Joining,
    Connected,
    /// Media gave up; the call carries on without audio.
    SignalingOnly,
    Left,
}

/// Media state for one `Active` call.
pub struct MediaSession {
    channel_id: ChannelId,
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<SessionState>,
    events: mpsc::Sender<MediaEvent>,
}

struct SessionState {
    phase: MediaPhase,
    channel: Option<Box<dyn MediaChannel>>,
    forwarder: Option<JoinHandle<()>>,
    /// Remote streams currently subscribed on `channel`.
    remote_streams: BTreeSet<StreamId>,
}

impl Shared {
    async fn emit(&self, event: MediaEvent) {
        let _ = self.events.send(event).await;
    }
}

impl MediaSession {
    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    pub async fn phase(&self) -> MediaPhase {
        self.shared.state.lock().await.phase
    }

    pub async fn remote_streams(&self) -> Vec<StreamId> {
        self.shared
            .state
            .lock()
            .await
            .remote_streams
            .iter()
            .cloned()
            .collect()
    }

    /// Unpublish, leave, and release the channel.
    ///
    /// Safe at any phase and idempotent: only the first call reaches the
    /// transport. An in-flight credential fetch or join observes `Left`
    /// when it completes and discards its result.
    pub async fn leave(&self) -> Result<(), MediaError> {
        let (channel, forwarder, streams) = {
            let mut state = self.shared.state.lock().await;
            if state.phase == MediaPhase::Left {
                return Ok(());
            }
            debug!(channel = %self.channel_id, phase = ?state.phase, "Leaving media");
            state.phase = MediaPhase::Left;
            (
                state.channel.take(),
                state.forwarder.take(),
                std::mem::take(&mut state.remote_streams),
            )
        };

        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }

        let Some(mut channel) = channel else {
            return Ok(());
        };

        for stream in &streams {
            if let Err(e) = channel.unsubscribe(stream).await {
                warn!(
                    channel = %self.channel_id,
                    stream = %stream,
                    error = %e,
                    "Unsubscribe failed"
                );
            }
        }
        let unpublished = channel.unpublish_local_audio().await;
        let left = channel.leave().await;
        info!(channel = %self.channel_id, "Media left");
        // The caller may be the only reader of this queue.
        let _ = self.shared.events.try_send(MediaEvent::Disconnected);

        if let Err(e) = &unpublished {
            warn!(channel = %self.channel_id, error = %e, "Unpublish failed");
        }
        if let Err(e) = &left {
            warn!(channel = %self.channel_id, error = %e, "Leave failed");
        }
        unpublished.and(left)
    }
}

// ---------------------------------------------------------------------------
// Connect task
// ---------------------------------------------------------------------------

async fn connect(
    shared: Arc<Shared>,
    adapter: MediaAdapter,
    channel_id: ChannelId,
    identity: Identity,
) {
    let retry_events = shared.events.clone();
    let credential = fetch_with_retry(
        adapter.credentials.as_ref(),
        &channel_id,
        &identity,
        adapter.settings.retry,
        move |attempt| {
            let _ = retry_events.try_send(MediaEvent::CredentialRetry { attempt });
        },
    )
    .await;

    let credential = match credential {
        Ok(credential) => credential,
        Err(e) => {
            warn!(
                channel = %channel_id,
                error = %e,
                "No media credential; continuing signaling-only"
            );
            downgrade(&shared, e.to_string()).await;
            return;
        }
    };

    {
        let mut state = shared.state.lock().await;
        if state.phase == MediaPhase::Left {
            debug!(channel = %channel_id, "Call ended during credential fetch; discarding");
            return;
        }
        state.phase = MediaPhase::Joining;
    }

    let request = JoinRequest {
        app_id: adapter.settings.app_id.clone(),
        channel_id: channel_id.clone(),
        token: credential.token,
        identity,
    };
    let joined = adapter.transport.join(request).await;

    let mut state = shared.state.lock().await;
    let mut channel = match joined {
        Ok(channel) => channel,
        Err(e) => {
            if state.phase != MediaPhase::Left {
                state.phase = MediaPhase::SignalingOnly;
                drop(state);
                warn!(channel = %channel_id, error = %e, "Media join failed");
                shared.emit(MediaEvent::Error(e.to_string())).await;
            }
            return;
        }
    };

    if state.phase == MediaPhase::Left {
        drop(state);
        debug!(channel = %channel_id, "Call ended during join; tearing down");
        if let Err(e) = channel.leave().await {
            warn!(channel = %channel_id, error = %e, "Leave after cancelled join failed");
        }
        return;
    }

    if let Err(e) = channel.publish_local_audio().await {
        state.phase = MediaPhase::SignalingOnly;
        drop(state);
        warn!(channel = %channel_id, error = %e, "Publish failed");
        let _ = channel.leave().await;
        shared.emit(MediaEvent::Error(e.to_string())).await;
        return;
    }

    state.forwarder = channel
        .take_remote_events()
        .map(|rx| tokio::spawn(track_remote(rx, Arc::clone(&shared))));
    state.channel = Some(channel);
    state.phase = MediaPhase::Connected;
    drop(state);

    info!(channel = %channel_id, "Media connected");
    shared.emit(MediaEvent::Connected).await;
}

async fn downgrade(shared: &Shared, reason: String) {
    {
        let mut state = shared.state.lock().await;
        if state.phase == MediaPhase::Left {
            return;
        }
        state.phase = MediaPhase::SignalingOnly;
    }
    shared.emit(MediaEvent::Error(reason)).await;
}

/// Keep `remote_streams` in step with the transport: subscribe to each new
/// stream once, unsubscribe when it goes away.
async fn track_remote(mut rx: mpsc::Receiver<RemoteStreamEvent>, shared: Arc<Shared>) {
    while let Some(event) = rx.recv().await {
        let mut guard = shared.state.lock().await;
        let state = &mut *guard;
        let Some(channel) = state.channel.as_mut() else {
            break;
        };
        if state.phase != MediaPhase::Connected {
            break;
        }

        let event = match event {
            RemoteStreamEvent::Added(id) => {
                if state.remote_streams.contains(&id) {
                    debug!(stream = %id, "Remote stream already subscribed");
                    continue;
                }
                if let Err(e) = channel.subscribe(&id).await {
                    warn!(stream = %id, error = %e, "Subscribe failed");
                    continue;
                }
                debug!(stream = %id, "Remote stream added");
                state.remote_streams.insert(id.clone());
                MediaEvent::RemoteStreamAdded(id)
            }
            RemoteStreamEvent::Removed(id) => {
                if !state.remote_streams.remove(&id) {
                    continue;
                }
                if let Err(e) = channel.unsubscribe(&id).await {
                    warn!(stream = %id, error = %e, "Unsubscribe failed");
                }
                debug!(stream = %id, "Remote stream removed");
                MediaEvent::RemoteStreamRemoved(id)
            }
        };
        drop(guard);
        shared.emit(event).await;
    }
}
