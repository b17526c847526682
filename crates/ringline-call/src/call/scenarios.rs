//! Call flows between controllers wired through an in-memory relay.

use std::sync::Arc;
use std::time::Duration;

use ringline_common::{ChannelId, Identity, ServerFrame, SignalingMessage};
use ringline_relay::{ConnectionRef, Origin, PresenceRegistry, RelayOutcome, SignalingRelay};
use tokio::sync::mpsc;

use super::*;
use crate::call_log::testing::MemoryCallLog;
use crate::media::testing::{FakeCredentials, FakeTransport};
use crate::media::{MediaAdapter, MediaEvent, MediaSettings};
use crate::signaling::SignalSink;

const RING: Duration = Duration::from_secs(45);

/// Queues outbound signals for the phone's relay pump.
struct QueueSink(mpsc::UnboundedSender<SignalingMessage>);

impl SignalSink for QueueSink {
    fn send(&self, message: SignalingMessage) {
        let _ = self.0.send(message);
    }
}

struct Phone {
    handle: CallHandle,
    events: mpsc::Receiver<CallEvent>,
    log: MemoryCallLog,
    transport: FakeTransport,
    connection: ConnectionRef,
}

impl Phone {
    async fn state(&self) -> CallState {
        self.handle.state().await.unwrap()
    }

    async fn channel(&self) -> Option<ChannelId> {
        self.handle
            .snapshot()
            .await
            .unwrap()
            .map(|s| s.channel_id)
    }

    fn drain(&mut self) -> Vec<CallEvent> {
        let mut out = Vec::new();
        while let Ok(e) = self.events.try_recv() {
            out.push(e);
        }
        out
    }

    fn last_reason(&self) -> Option<EndReason> {
        self.log.records().last().map(|s| s.reason.clone())
    }
}

struct Network {
    relay: SignalingRelay,
}

impl Network {
    fn new() -> Self {
        Self {
            relay: SignalingRelay::new(PresenceRegistry::new()),
        }
    }

    async fn phone(&self, id: &str) -> Phone {
        self.phone_with(id, FakeTransport::default()).await
    }

    async fn phone_with(&self, id: &str, transport: FakeTransport) -> Phone {
        self.build(id, transport, Vec::new()).await
    }

    /// A phone whose n-th inbound message is held back by `latency[n]`;
    /// messages past the end of the list arrive immediately.
    async fn phone_behind(&self, id: &str, latency: Vec<Duration>) -> Phone {
        self.build(id, FakeTransport::default(), latency).await
    }

    async fn build(&self, id: &str, transport: FakeTransport, latency: Vec<Duration>) -> Phone {
        let identity = Identity::from(id);
        let (conn_tx, mut conn_rx) = mpsc::channel::<String>(64);
        let connection = ConnectionRef::new(conn_tx);
        self.relay
            .registry()
            .register(&identity, connection.clone())
            .await;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let log = MemoryCallLog::default();
        let (handle, events) = CallHandle::spawn(CallDeps {
            identity: identity.clone(),
            display_name: format!("User {id}"),
            signals: Arc::new(QueueSink(out_tx)),
            media: MediaAdapter::new(
                Arc::new(FakeCredentials::default()),
                Arc::new(transport.clone()),
                MediaSettings::default(),
            ),
            call_log: Arc::new(log.clone()),
            ring_timeout: RING,
        });

        // Outbound: phone -> relay. A `failed` comes straight back.
        let relay = self.relay.clone();
        let origin = Origin {
            identity,
            connection: connection.id(),
        };
        let back = handle.clone();
        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                match relay.relay(&origin, &message, &message.to_json()).await {
                    RelayOutcome::Forwarded | RelayOutcome::Rejected(_) => {}
                    RelayOutcome::Failed(failed) => {
                        let _ = back.deliver(failed).await;
                    }
                }
            }
        });

        // Inbound: relay -> phone, in order.
        let inbound = handle.clone();
        tokio::spawn(async move {
            let mut latency = latency.into_iter();
            while let Some(text) = conn_rx.recv().await {
                if let Some(delay) = latency.next() {
                    tokio::time::sleep(delay).await;
                }
                if let Ok(ServerFrame::Signal(message)) = ServerFrame::parse(&text) {
                    let _ = inbound.deliver(message).await;
                }
            }
        });

        Phone {
            handle,
            events,
            log,
            transport,
            connection,
        }
    }

    /// Drop a phone's relay registration; nothing reaches it afterwards.
    async fn partition(&self, phone: &Phone) {
        self.relay.registry().unregister(&phone.connection).await;
    }
}

/// Let every task run until idle. Time is paused, so this never waits.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// "+100" calls "+200" and "+200" answers.
async fn connected_pair(net: &Network) -> (Phone, Phone, ChannelId) {
    let alice = net.phone("+100").await;
    let bob = net.phone("+200").await;
    let channel = alice.handle.dial("+200").await.unwrap();
    settle().await;
    bob.handle.accept().await.unwrap();
    settle().await;
    (alice, bob, channel)
}

#[tokio::test(start_paused = true)]
async fn dial_and_answer_reaches_active_on_both_sides() {
    let net = Network::new();
    let mut alice = net.phone("+100").await;
    let mut bob = net.phone("+200").await;

    let channel = alice.handle.dial("+200").await.unwrap();
    assert_eq!(alice.state().await, CallState::OutgoingRinging);
    settle().await;

    assert_eq!(bob.state().await, CallState::IncomingRinging);
    let ringing = bob.handle.snapshot().await.unwrap().unwrap();
    assert_eq!(ringing.caller, Identity::from("+100"));
    assert_eq!(ringing.channel_id, channel);
    assert!(bob.drain().contains(&CallEvent::IncomingCall {
        channel_id: channel.clone(),
        caller: "+100".into(),
        caller_display_name: "User +100".into(),
    }));

    bob.handle.accept().await.unwrap();
    settle().await;

    assert_eq!(alice.state().await, CallState::Active);
    assert_eq!(bob.state().await, CallState::Active);
    assert_eq!(alice.channel().await, Some(channel.clone()));
    assert_eq!(bob.channel().await, Some(channel.clone()));

    // Both sides joined the same media channel.
    for phone in [&alice, &bob] {
        assert_eq!(
            phone.transport.ops(),
            vec![format!("join:{channel}"), "publish".into()]
        );
    }
    assert!(alice.drain().contains(&CallEvent::Media {
        channel_id: channel,
        event: MediaEvent::Connected,
    }));
}

#[tokio::test(start_paused = true)]
async fn hang_up_ends_both_sides_and_logs_once() {
    let net = Network::new();
    let (alice, bob, channel) = connected_pair(&net).await;

    alice.handle.hang_up().await.unwrap();
    settle().await;

    assert_eq!(alice.state().await, CallState::Idle);
    assert_eq!(bob.state().await, CallState::Idle);
    for phone in [&alice, &bob] {
        let records = phone.log.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.channel_id, channel);
        assert_eq!(record.reason, EndReason::Completed);
        let answered = record.answered_at.unwrap();
        assert_eq!(
            record.duration_seconds as i64,
            (record.ended_at - answered).num_seconds()
        );
        assert_eq!(phone.transport.count("leave"), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn dialing_unregistered_target_fails() {
    let net = Network::new();
    let mut alice = net.phone("+100").await;

    let channel = alice.handle.dial("+300").await.unwrap();
    settle().await;

    assert_eq!(alice.state().await, CallState::Idle);
    assert_eq!(
        alice.last_reason(),
        Some(EndReason::Failed("target unavailable".into()))
    );
    assert!(alice.drain().contains(&CallEvent::StateChanged {
        channel_id: channel,
        state: CallState::Ended,
    }));
    assert!(alice.transport.ops().is_empty());
}

#[tokio::test(start_paused = true)]
async fn invite_to_busy_callee_is_declined_without_disturbing_call() {
    let net = Network::new();
    let (alice, mut bob, c1) = connected_pair(&net).await;
    let carol = net.phone("+400").await;

    let c2 = carol.handle.dial("+200").await.unwrap();
    settle().await;

    assert_eq!(carol.state().await, CallState::Idle);
    assert_eq!(
        carol.last_reason(),
        Some(EndReason::Declined("busy".into()))
    );
    assert!(bob.drain().contains(&CallEvent::BusyRejected {
        channel_id: c2,
        caller: "+400".into(),
    }));

    assert_eq!(bob.state().await, CallState::Active);
    assert_eq!(bob.channel().await, Some(c1.clone()));
    assert_eq!(alice.state().await, CallState::Active);
    assert!(bob.log.records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn second_dial_while_ringing_is_refused() {
    let net = Network::new();
    let alice = net.phone("+100").await;
    let _bob = net.phone("+200").await;

    let first = alice.handle.dial("+200").await.unwrap();
    assert_eq!(alice.handle.dial("+300").await, Err(CallError::Busy));
    assert_eq!(alice.channel().await, Some(first));
    assert_eq!(alice.state().await, CallState::OutgoingRinging);
}

#[tokio::test(start_paused = true)]
async fn unanswered_call_times_out_on_both_sides_independently() {
    let net = Network::new();
    let alice = net.phone("+100").await;
    let bob = net.phone("+200").await;

    alice.handle.dial("+200").await.unwrap();
    settle().await;
    assert_eq!(bob.state().await, CallState::IncomingRinging);

    // Lose the relay path to the callee: no message crosses after the invite.
    net.partition(&bob).await;

    tokio::time::sleep(RING + Duration::from_secs(1)).await;
    settle().await;

    assert_eq!(alice.state().await, CallState::Idle);
    assert_eq!(bob.state().await, CallState::Idle);
    assert_eq!(alice.last_reason(), Some(EndReason::NoAnswer));
    assert_eq!(bob.last_reason(), Some(EndReason::NoAnswer));
}

#[tokio::test(start_paused = true)]
async fn caller_timeout_arriving_before_callee_timer_is_no_answer() {
    let net = Network::new();
    let alice = net.phone("+100").await;
    // The invite is slow and the caller's `end` is quicker, so the callee's
    // timer is still pending when that `end` lands.
    let bob = net
        .phone_behind(
            "+200",
            vec![Duration::from_millis(300), Duration::from_millis(100)],
        )
        .await;

    alice.handle.dial("+200").await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(bob.state().await, CallState::IncomingRinging);

    // Caller gives up at 45s; its `end` reaches the callee at 45.1s, before
    // the callee's own timer at 45.3s.
    let wait = RING - Duration::from_millis(400) + Duration::from_millis(150);
    tokio::time::sleep(wait).await;
    assert_eq!(alice.state().await, CallState::Idle);
    assert_eq!(bob.state().await, CallState::Idle);
    assert_eq!(alice.last_reason(), Some(EndReason::NoAnswer));
    assert_eq!(bob.last_reason(), Some(EndReason::NoAnswer));

    settle().await;
    assert_eq!(bob.log.records().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn callee_decline_ends_caller_call() {
    let net = Network::new();
    let alice = net.phone("+100").await;
    let bob = net.phone("+200").await;

    alice.handle.dial("+200").await.unwrap();
    settle().await;

    bob.handle.decline().await.unwrap();
    settle().await;
    assert_eq!(
        alice.last_reason(),
        Some(EndReason::Declined("declined".into()))
    );
    assert_eq!(
        bob.last_reason(),
        Some(EndReason::Declined("declined".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn caller_cancel_stops_callee_ringing() {
    let net = Network::new();
    let alice = net.phone("+100").await;
    let bob = net.phone("+200").await;

    alice.handle.dial("+200").await.unwrap();
    settle().await;
    alice.handle.hang_up().await.unwrap();
    settle().await;

    assert_eq!(bob.state().await, CallState::Idle);
    assert_eq!(alice.last_reason(), Some(EndReason::Cancelled));
    assert_eq!(bob.last_reason(), Some(EndReason::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn hang_up_during_media_join_discards_the_join() {
    let net = Network::new();
    let alice = net.phone("+100").await;
    let (transport, gate) = FakeTransport::gated();
    let bob = net.phone_with("+200", transport).await;

    alice.handle.dial("+200").await.unwrap();
    settle().await;
    bob.handle.accept().await.unwrap();
    settle().await;

    // Bob's join is still in flight when Alice hangs up.
    alice.handle.hang_up().await.unwrap();
    settle().await;
    assert_eq!(bob.state().await, CallState::Idle);

    gate.notify_one();
    settle().await;
    let ops = bob.transport.ops();
    assert_eq!(ops.len(), 2);
    assert!(ops[0].starts_with("join:"));
    assert_eq!(ops[1], "leave");
}

#[tokio::test(start_paused = true)]
async fn shutdown_hangs_up_live_call() {
    let net = Network::new();
    let (alice, bob, _) = connected_pair(&net).await;

    alice.handle.shutdown().await;
    settle().await;

    assert_eq!(bob.state().await, CallState::Idle);
    assert_eq!(bob.last_reason(), Some(EndReason::Completed));
    assert_eq!(
        alice.handle.dial("+200").await,
        Err(CallError::ControllerClosed)
    );
}
