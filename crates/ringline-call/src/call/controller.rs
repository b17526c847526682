//! Async driver for `CallMachine`.
//!
//! One task owns the machine and applies inputs one at a time: local
//! intents from `CallHandle`, signals from the relay, ring timeouts, and
//! media progress. Effects are executed in the order the machine returns
//! them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ringline_common::{ChannelId, Identity, SignalingMessage};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::call_log::CallLog;
use crate::media::{MediaAdapter, MediaEvent, MediaSession};
use crate::signaling::SignalSink;

use super::error::CallError;
use super::machine::CallMachine;
use super::types::{CallEffect, CallEvent, CallInput, CallSession, CallState};

/// Collaborators and policy for one client's calls.
pub struct CallDeps {
    pub identity: Identity,
    pub display_name: String,
    pub signals: Arc<dyn SignalSink>,
    pub media: MediaAdapter,
    pub call_log: Arc<dyn CallLog>,
    pub ring_timeout: Duration,
}

type Reply = oneshot::Sender<Result<Option<ChannelId>, CallError>>;

enum Command {
    Local { input: CallInput, reply: Reply },
    Remote(SignalingMessage),
    Snapshot(oneshot::Sender<Option<CallSession>>),
    Shutdown(oneshot::Sender<()>),
}

/// Produced by the controller's own timers and media sessions.
enum Internal {
    RingTimeout(ChannelId),
    Media {
        channel_id: ChannelId,
        event: MediaEvent,
    },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable handle to a running call controller.
#[derive(Clone)]
pub struct CallHandle {
    command_tx: mpsc::Sender<Command>,
}

impl CallHandle {
    /// Start the controller task.
    /// Returns `(handle, event_receiver)`.
    pub fn spawn(deps: CallDeps) -> (Self, mpsc::Receiver<CallEvent>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(256);
        let (internal_tx, internal_rx) = mpsc::channel(64);

        let controller = Controller {
            machine: CallMachine::new(deps.identity, deps.display_name),
            signals: deps.signals,
            media: deps.media,
            call_log: deps.call_log,
            ring_timeout: deps.ring_timeout,
            event_tx,
            internal_tx,
            ring_timer: None,
            media_session: None,
        };
        tokio::spawn(controller.run(command_rx, internal_rx));

        (Self { command_tx }, event_rx)
    }

    /// Call `to`. Returns the new call's channel id.
    pub async fn dial(&self, to: impl Into<Identity>) -> Result<ChannelId, CallError> {
        self.local(CallInput::Dial { to: to.into() })
            .await?
            .ok_or(CallError::NoActiveCall)
    }

    pub async fn accept(&self) -> Result<(), CallError> {
        self.local(CallInput::Accept).await.map(|_| ())
    }

    pub async fn decline(&self) -> Result<(), CallError> {
        self.local(CallInput::Decline).await.map(|_| ())
    }

    /// Hang up, cancel, or decline, whichever the current state calls for.
    pub async fn hang_up(&self) -> Result<(), CallError> {
        self.local(CallInput::HangUp).await.map(|_| ())
    }

    /// Feed a signaling message received from the relay.
    pub async fn deliver(&self, message: SignalingMessage) -> Result<(), CallError> {
        self.command_tx
            .send(Command::Remote(message))
            .await
            .map_err(|_| CallError::ControllerClosed)
    }

    /// A copy of the live session, if any.
    pub async fn snapshot(&self) -> Result<Option<CallSession>, CallError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Snapshot(tx))
            .await
            .map_err(|_| CallError::ControllerClosed)?;
        rx.await.map_err(|_| CallError::ControllerClosed)
    }

    pub async fn state(&self) -> Result<CallState, CallError> {
        Ok(self
            .snapshot()
            .await?
            .map(|s| s.state)
            .unwrap_or(CallState::Idle))
    }

    /// Hang up any live call and stop the controller. Returns once the
    /// hang-up has been handed to the signal sink.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.command_tx.send(Command::Shutdown(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    async fn local(&self, input: CallInput) -> Result<Option<ChannelId>, CallError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Local { input, reply })
            .await
            .map_err(|_| CallError::ControllerClosed)?;
        rx.await.map_err(|_| CallError::ControllerClosed)?
    }
}

// ---------------------------------------------------------------------------
// Controller task
// ---------------------------------------------------------------------------

struct Controller {
    machine: CallMachine,
    signals: Arc<dyn SignalSink>,
    media: MediaAdapter,
    call_log: Arc<dyn CallLog>,
    ring_timeout: Duration,
    event_tx: mpsc::Sender<CallEvent>,
    internal_tx: mpsc::Sender<Internal>,
    ring_timer: Option<(ChannelId, JoinHandle<()>)>,
    media_session: Option<MediaSession>,
}

impl Controller {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<Command>,
        mut internal_rx: mpsc::Receiver<Internal>,
    ) {
        info!(identity = %self.machine.local(), "Call controller started");

        let done = loop {
            tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(Command::Local { input, reply }) => {
                        let result = self.apply(input).await;
                        let channel = self.machine.session().map(|s| s.channel_id.clone());
                        let _ = reply.send(result.map(|()| channel));
                    }
                    Some(Command::Remote(message)) => {
                        let _ = self.apply(CallInput::Remote(message)).await;
                    }
                    Some(Command::Snapshot(reply)) => {
                        let _ = reply.send(self.machine.session().cloned());
                    }
                    Some(Command::Shutdown(done)) => break Some(done),
                    None => break None,
                },

                Some(internal) = internal_rx.recv() => match internal {
                    Internal::RingTimeout(channel_id) => {
                        let _ = self.apply(CallInput::RingTimeout { channel_id }).await;
                    }
                    Internal::Media { channel_id, event } => {
                        let _ = self.event_tx.send(CallEvent::Media { channel_id, event }).await;
                    }
                },
            }
        };

        if self.machine.session().is_some() {
            let _ = self.apply(CallInput::HangUp).await;
        }
        self.cancel_ring_timer(None);
        if let Some(media) = self.media_session.take() {
            let _ = media.leave().await;
        }
        info!(identity = %self.machine.local(), "Call controller stopped");
        if let Some(done) = done {
            let _ = done.send(());
        }
    }

    async fn apply(&mut self, input: CallInput) -> Result<(), CallError> {
        match self.machine.handle(input, Utc::now()) {
            Ok(effects) => {
                for effect in effects {
                    self.execute(effect).await;
                }
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, state = %self.machine.state(), "Call action refused");
                Err(e)
            }
        }
    }

    async fn execute(&mut self, effect: CallEffect) {
        match effect {
            CallEffect::Send(message) => self.signals.send(message),
            CallEffect::ArmRingTimer { channel_id } => self.arm_ring_timer(channel_id),
            CallEffect::CancelRingTimer { channel_id } => self.cancel_ring_timer(Some(&channel_id)),
            CallEffect::StartMedia { channel_id } => self.start_media(channel_id),
            CallEffect::StopMedia { channel_id } => self.stop_media(&channel_id).await,
            CallEffect::Emit(event) => {
                let _ = self.event_tx.send(event).await;
            }
            CallEffect::LogCall(summary) => self.call_log.record(&summary),
        }
    }

    fn arm_ring_timer(&mut self, channel_id: ChannelId) {
        self.cancel_ring_timer(None);
        let tx = self.internal_tx.clone();
        let timeout = self.ring_timeout;
        let id = channel_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(Internal::RingTimeout(id)).await;
        });
        self.ring_timer = Some((channel_id, handle));
    }

    /// Cancel the ring timer, only if it belongs to `channel_id` when given.
    fn cancel_ring_timer(&mut self, channel_id: Option<&ChannelId>) {
        let matches = match (&self.ring_timer, channel_id) {
            (Some((armed, _)), Some(id)) => armed == id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if matches {
            if let Some((_, handle)) = self.ring_timer.take() {
                handle.abort();
            }
        }
    }

    fn start_media(&mut self, channel_id: ChannelId) {
        let (media_tx, mut media_rx) = mpsc::channel(32);
        let session = self.media.start(
            channel_id.clone(),
            self.machine.local().clone(),
            media_tx,
        );

        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = media_rx.recv().await {
                let msg = Internal::Media {
                    channel_id: channel_id.clone(),
                    event,
                };
                if internal.send(msg).await.is_err() {
                    break;
                }
            }
        });

        if let Some(stale) = self.media_session.replace(session) {
            warn!(channel = %stale.channel_id(), "Replacing media session that was never stopped");
            tokio::spawn(async move {
                let _ = stale.leave().await;
            });
        }
    }

    async fn stop_media(&mut self, channel_id: &ChannelId) {
        let Some(media) = self.media_session.take() else {
            return;
        };
        if media.channel_id() != channel_id {
            debug!(
                channel = %channel_id,
                current = %media.channel_id(),
                "Stop for other media session"
            );
        }
        if let Err(e) = media.leave().await {
            warn!(channel = %channel_id, error = %e, "Media teardown reported an error");
        }
    }
}
