//! Signaling relay: resolve the target of a call message and forward it.
//!
//! The relay never judges call-state legality. It only checks that the
//! sender is who it registered as, then forwards the original text frame
//! or answers with `failed`.

use ringline_common::{reasons, Identity, ProtocolError, SignalingMessage};

use crate::presence::{ConnectionId, DeliveryError, PresenceRegistry};

/// The registered sender of a frame.
#[derive(Debug, Clone)]
pub struct Origin {
    pub identity: Identity,
    pub connection: ConnectionId,
}

/// What the connection handler should do after a relay attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Queued on the target's connection.
    Forwarded,
    /// Target unreachable; send this `failed` back to the sender.
    Failed(SignalingMessage),
    /// The sender may not send this; answer with an error frame.
    Rejected(String),
}

#[derive(Clone)]
pub struct SignalingRelay {
    registry: PresenceRegistry,
}

impl SignalingRelay {
    pub fn new(registry: PresenceRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PresenceRegistry {
        &self.registry
    }

    /// Forward `message` (whose wire form is `raw`) to its target.
    ///
    /// No retries and no queueing: an absent or dead target always yields
    /// exactly one `failed` for the sender.
    pub async fn relay(
        &self,
        origin: &Origin,
        message: &SignalingMessage,
        raw: &str,
    ) -> RelayOutcome {
        if let Err(e) = self.check_origin(origin, message).await {
            tracing::warn!(
                identity = %origin.identity,
                kind = %message.kind(),
                error = %e,
                "Rejected signaling message"
            );
            return RelayOutcome::Rejected(e.to_string());
        }

        let target = message.to();
        let Some(connection) = self.registry.lookup(target).await else {
            tracing::info!(
                from = %origin.identity,
                to = %target,
                channel = %message.channel_id(),
                kind = %message.kind(),
                "Target unavailable"
            );
            return self.fail(message);
        };

        match connection.try_deliver(raw.to_string()) {
            Ok(()) => {
                tracing::debug!(
                    from = %origin.identity,
                    to = %target,
                    channel = %message.channel_id(),
                    kind = %message.kind(),
                    "Relayed"
                );
                RelayOutcome::Forwarded
            }
            Err(e) => {
                if e == DeliveryError::Full {
                    tracing::warn!(to = %target, "Target outbound buffer full, dropping");
                }
                tracing::info!(
                    from = %origin.identity,
                    to = %target,
                    channel = %message.channel_id(),
                    error = ?e,
                    "Target unreachable"
                );
                self.fail(message)
            }
        }
    }

    async fn check_origin(
        &self,
        origin: &Origin,
        message: &SignalingMessage,
    ) -> Result<(), ProtocolError> {
        match self.registry.identity_of(origin.connection).await {
            Some(current) if current == origin.identity => {}
            _ => return Err(ProtocolError::NotRegistered),
        }

        match message.from() {
            None => Err(ProtocolError::Unexpected("failed is relay-originated".into())),
            Some(from) if *from != origin.identity => Err(ProtocolError::IdentityMismatch {
                registered: origin.identity.to_string(),
                claimed: from.to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    fn fail(&self, message: &SignalingMessage) -> RelayOutcome {
        match message.failed_reply(reasons::TARGET_UNAVAILABLE) {
            Some(reply) => RelayOutcome::Failed(reply),
            // check_origin already refused `failed`, which is the only
            // message without a sender.
            None => RelayOutcome::Rejected("failed is relay-originated".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::ConnectionRef;
    use ringline_common::{ChannelId, ServerFrame};
    use tokio::sync::mpsc;

    struct Peer {
        origin: Origin,
        rx: mpsc::Receiver<String>,
    }

    async fn join(registry: &PresenceRegistry, id: &str) -> Peer {
        let (tx, rx) = mpsc::channel(16);
        let conn = ConnectionRef::new(tx);
        let origin = Origin {
            identity: id.into(),
            connection: conn.id(),
        };
        registry.register(&id.into(), conn).await;
        Peer { origin, rx }
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(t) = rx.try_recv() {
            out.push(t);
        }
        out
    }

    fn invite(from: &str, to: &str, channel: &str) -> SignalingMessage {
        SignalingMessage::Invite {
            from: from.into(),
            to: to.into(),
            channel_id: ChannelId::from(channel),
            caller_display_name: from.into(),
        }
    }

    #[tokio::test]
    async fn forwards_verbatim_to_registered_target() {
        let registry = PresenceRegistry::new();
        let relay = SignalingRelay::new(registry.clone());
        let alice = join(&registry, "+100").await;
        let mut bob = join(&registry, "+200").await;
        drain(&mut bob.rx);

        let msg = invite("+100", "+200", "c1");
        let raw = msg.to_json();
        assert_eq!(
            relay.relay(&alice.origin, &msg, &raw).await,
            RelayOutcome::Forwarded
        );
        assert_eq!(drain(&mut bob.rx), vec![raw]);
    }

    #[tokio::test]
    async fn unregistered_target_yields_exactly_one_failed() {
        let registry = PresenceRegistry::new();
        let relay = SignalingRelay::new(registry.clone());
        let alice = join(&registry, "+100").await;

        let msg = invite("+100", "+300", "c1");
        let outcome = relay.relay(&alice.origin, &msg, &msg.to_json()).await;
        assert_eq!(
            outcome,
            RelayOutcome::Failed(SignalingMessage::Failed {
                to: "+100".into(),
                channel_id: "c1".into(),
                reason: "target unavailable".into(),
            })
        );
    }

    #[tokio::test]
    async fn closed_target_connection_yields_failed() {
        let registry = PresenceRegistry::new();
        let relay = SignalingRelay::new(registry.clone());
        let alice = join(&registry, "+100").await;
        let bob = join(&registry, "+200").await;
        drop(bob.rx);

        let msg = invite("+100", "+200", "c1");
        let outcome = relay.relay(&alice.origin, &msg, &msg.to_json()).await;
        assert!(matches!(outcome, RelayOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn forwards_out_of_protocol_messages() {
        let registry = PresenceRegistry::new();
        let relay = SignalingRelay::new(registry.clone());
        let alice = join(&registry, "+100").await;
        let mut bob = join(&registry, "+200").await;
        drain(&mut bob.rx);

        let stray = SignalingMessage::Accept {
            from: "+100".into(),
            to: "+200".into(),
            channel_id: "never-invited".into(),
        };
        let outcome = relay.relay(&alice.origin, &stray, &stray.to_json()).await;
        assert_eq!(outcome, RelayOutcome::Forwarded);
        assert_eq!(drain(&mut bob.rx).len(), 1);
    }

    #[tokio::test]
    async fn rejects_spoofed_sender() {
        let registry = PresenceRegistry::new();
        let relay = SignalingRelay::new(registry.clone());
        let alice = join(&registry, "+100").await;
        let mut bob = join(&registry, "+200").await;
        drain(&mut bob.rx);

        let msg = invite("+999", "+200", "c1");
        let outcome = relay.relay(&alice.origin, &msg, &msg.to_json()).await;
        assert!(
            matches!(outcome, RelayOutcome::Rejected(ref m) if m.contains("identity mismatch"))
        );
        assert!(drain(&mut bob.rx).is_empty());
    }

    #[tokio::test]
    async fn rejects_client_originated_failed() {
        let registry = PresenceRegistry::new();
        let relay = SignalingRelay::new(registry.clone());
        let alice = join(&registry, "+100").await;
        join(&registry, "+200").await;

        let msg = SignalingMessage::Failed {
            to: "+200".into(),
            channel_id: "c1".into(),
            reason: "x".into(),
        };
        let outcome = relay.relay(&alice.origin, &msg, &msg.to_json()).await;
        assert!(matches!(outcome, RelayOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn rejects_superseded_connection() {
        let registry = PresenceRegistry::new();
        let relay = SignalingRelay::new(registry.clone());
        let stale = join(&registry, "+100").await;
        let _fresh = join(&registry, "+100").await;
        let mut bob = join(&registry, "+200").await;
        drain(&mut bob.rx);

        let msg = invite("+100", "+200", "c1");
        let outcome = relay.relay(&stale.origin, &msg, &msg.to_json()).await;
        assert_eq!(outcome, RelayOutcome::Rejected("not registered".into()));
        assert!(drain(&mut bob.rx).is_empty());
    }

    #[tokio::test]
    async fn preserves_order_per_pair() {
        let registry = PresenceRegistry::new();
        let relay = SignalingRelay::new(registry.clone());
        let alice = join(&registry, "+100").await;
        let mut bob = join(&registry, "+200").await;
        drain(&mut bob.rx);

        let first = invite("+100", "+200", "c1");
        let second = SignalingMessage::End {
            from: "+100".into(),
            to: "+200".into(),
            channel_id: "c1".into(),
            duration_seconds: 0,
            reason: None,
        };
        relay.relay(&alice.origin, &first, &first.to_json()).await;
        relay.relay(&alice.origin, &second, &second.to_json()).await;

        let got: Vec<ServerFrame> = drain(&mut bob.rx)
            .iter()
            .map(|t| ServerFrame::parse(t).unwrap())
            .collect();
        assert_eq!(
            got,
            vec![ServerFrame::Signal(first), ServerFrame::Signal(second)]
        );
    }
}
