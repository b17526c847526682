//! Deterministic call state machine.
//!
//! `CallMachine` owns at most one live `CallSession`. Every input goes
//! through `handle`, which mutates the session and returns the effects the
//! driver must perform. The machine does no I/O and reads no clock; `now`
//! is always passed in.

use chrono::{DateTime, Utc};
use ringline_common::{reasons, ChannelId, Identity, SignalingMessage};
use tracing::{debug, info};

use super::error::CallError;
use super::types::{CallEffect, CallEvent, CallInput, CallSession, CallState, Direction, EndReason};

pub struct CallMachine {
    local: Identity,
    display_name: String,
    /// `None` is `Idle`. Ended sessions are dropped, never kept.
    current: Option<CallSession>,
}

impl CallMachine {
    pub fn new(local: Identity, display_name: impl Into<String>) -> Self {
        Self {
            local,
            display_name: display_name.into(),
            current: None,
        }
    }

    pub fn local(&self) -> &Identity {
        &self.local
    }

    pub fn state(&self) -> CallState {
        self.current
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(CallState::Idle)
    }

    pub fn session(&self) -> Option<&CallSession> {
        self.current.as_ref()
    }

    /// The single transition function.
    pub fn handle(
        &mut self,
        input: CallInput,
        now: DateTime<Utc>,
    ) -> Result<Vec<CallEffect>, CallError> {
        match input {
            CallInput::Dial { to } => self.dial(to, now),
            CallInput::Accept => self.accept(now),
            CallInput::Decline => self.decline(now),
            CallInput::HangUp => self.hang_up(now),
            CallInput::Remote(message) => Ok(self.on_message(message, now)),
            CallInput::RingTimeout { channel_id } => Ok(self.on_ring_timeout(&channel_id, now)),
        }
    }

    // -----------------------------------------------------------------------
    // Local intent
    // -----------------------------------------------------------------------

    fn dial(&mut self, to: Identity, now: DateTime<Utc>) -> Result<Vec<CallEffect>, CallError> {
        if self.current.is_some() {
            return Err(CallError::Busy);
        }
        if to.is_empty() || to == self.local {
            return Err(CallError::InvalidTarget(to));
        }

        let session = CallSession::outgoing(&self.local, &to, now);
        let channel_id = session.channel_id.clone();
        info!(to = %to, channel = %channel_id, "Dialing");

        let effects = vec![
            CallEffect::Send(SignalingMessage::Invite {
                from: self.local.clone(),
                to,
                channel_id: channel_id.clone(),
                caller_display_name: self.display_name.clone(),
            }),
            CallEffect::ArmRingTimer {
                channel_id: channel_id.clone(),
            },
            CallEffect::Emit(CallEvent::StateChanged {
                channel_id,
                state: CallState::OutgoingRinging,
            }),
        ];
        self.current = Some(session);
        Ok(effects)
    }

    fn accept(&mut self, now: DateTime<Utc>) -> Result<Vec<CallEffect>, CallError> {
        let session = Self::require(&mut self.current, CallState::IncomingRinging, "accept")?;
        session.state = CallState::Active;
        session.answered_at = Some(now);
        let channel_id = session.channel_id.clone();
        info!(caller = %session.caller, channel = %channel_id, "Call accepted");

        Ok(vec![
            CallEffect::Send(SignalingMessage::Accept {
                from: self.local.clone(),
                to: session.caller.clone(),
                channel_id: channel_id.clone(),
            }),
            CallEffect::CancelRingTimer {
                channel_id: channel_id.clone(),
            },
            CallEffect::StartMedia {
                channel_id: channel_id.clone(),
            },
            CallEffect::Emit(CallEvent::StateChanged {
                channel_id,
                state: CallState::Active,
            }),
        ])
    }

    fn decline(&mut self, now: DateTime<Utc>) -> Result<Vec<CallEffect>, CallError> {
        let session = Self::require(&mut self.current, CallState::IncomingRinging, "decline")?;
        let send = SignalingMessage::Decline {
            from: self.local.clone(),
            to: session.caller.clone(),
            channel_id: session.channel_id.clone(),
            reason: reasons::DECLINED.into(),
        };
        Ok(self.finish(
            vec![CallEffect::Send(send)],
            EndReason::Declined(reasons::DECLINED.into()),
            now,
        ))
    }

    fn hang_up(&mut self, now: DateTime<Utc>) -> Result<Vec<CallEffect>, CallError> {
        let Some(session) = self.current.as_ref() else {
            return Err(CallError::NoActiveCall);
        };

        match session.state {
            CallState::Active => {
                let send = SignalingMessage::End {
                    from: self.local.clone(),
                    to: session.peer().clone(),
                    channel_id: session.channel_id.clone(),
                    duration_seconds: session.talk_seconds(now).unwrap_or(0),
                    reason: None,
                };
                Ok(self.finish(vec![CallEffect::Send(send)], EndReason::Completed, now))
            }
            CallState::OutgoingRinging => {
                let send = SignalingMessage::End {
                    from: self.local.clone(),
                    to: session.callee.clone(),
                    channel_id: session.channel_id.clone(),
                    duration_seconds: 0,
                    reason: None,
                };
                Ok(self.finish(vec![CallEffect::Send(send)], EndReason::Cancelled, now))
            }
            CallState::IncomingRinging => self.decline(now),
            state @ (CallState::Idle | CallState::Ended) => Err(CallError::InvalidState {
                action: "hang up",
                state,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Remote events
    // -----------------------------------------------------------------------

    fn on_message(&mut self, message: SignalingMessage, now: DateTime<Utc>) -> Vec<CallEffect> {
        if *message.to() != self.local {
            debug!(to = %message.to(), "Ignoring message addressed elsewhere");
            return Vec::new();
        }

        if let SignalingMessage::Invite {
            from,
            channel_id,
            caller_display_name,
            ..
        } = &message
        {
            return self.on_invite(from, channel_id, caller_display_name, now);
        }

        let Some(session) = self.current.as_ref() else {
            debug!(kind = %message.kind(), channel = %message.channel_id(), "No call; ignoring");
            return Vec::new();
        };
        if session.channel_id != *message.channel_id() {
            debug!(
                kind = %message.kind(),
                channel = %message.channel_id(),
                "Channel mismatch; ignoring"
            );
            return Vec::new();
        }
        if let Some(from) = message.from() {
            if from != session.peer() {
                debug!(from = %from, "Message from non-participant; ignoring");
                return Vec::new();
            }
        }

        match (session.state, message) {
            (CallState::OutgoingRinging, SignalingMessage::Accept { .. }) => {
                let Some(session) = self.current.as_mut() else {
                    return Vec::new();
                };
                session.state = CallState::Active;
                session.answered_at = Some(now);
                let channel_id = session.channel_id.clone();
                info!(callee = %session.callee, channel = %channel_id, "Call answered");
                vec![
                    CallEffect::CancelRingTimer {
                        channel_id: channel_id.clone(),
                    },
                    CallEffect::StartMedia {
                        channel_id: channel_id.clone(),
                    },
                    CallEffect::Emit(CallEvent::StateChanged {
                        channel_id,
                        state: CallState::Active,
                    }),
                ]
            }
            (CallState::OutgoingRinging, SignalingMessage::Decline { reason, .. }) => {
                self.finish(Vec::new(), EndReason::from_decline(&reason), now)
            }
            (CallState::IncomingRinging, SignalingMessage::End { reason, .. }) => {
                // The caller's ring timer can fire before ours does.
                let reason = match reason.as_deref() {
                    Some(reasons::NO_ANSWER) => EndReason::NoAnswer,
                    _ => EndReason::Cancelled,
                };
                self.finish(Vec::new(), reason, now)
            }
            (CallState::Active, SignalingMessage::End { .. }) => {
                self.finish(Vec::new(), EndReason::Completed, now)
            }
            (_, SignalingMessage::Failed { reason, .. }) => {
                self.finish(Vec::new(), EndReason::Failed(reason), now)
            }
            (state, message) => {
                debug!(state = %state, kind = %message.kind(), "Out-of-protocol message; ignoring");
                Vec::new()
            }
        }
    }

    fn on_invite(
        &mut self,
        from: &Identity,
        channel_id: &ChannelId,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Vec<CallEffect> {
        match self.current.as_ref() {
            None => {
                let session =
                    CallSession::incoming(&self.local, from, channel_id, display_name, now);
                info!(caller = %from, channel = %channel_id, "Incoming call");
                self.current = Some(session);
                vec![
                    CallEffect::ArmRingTimer {
                        channel_id: channel_id.clone(),
                    },
                    CallEffect::Emit(CallEvent::IncomingCall {
                        channel_id: channel_id.clone(),
                        caller: from.clone(),
                        caller_display_name: display_name.to_string(),
                    }),
                    CallEffect::Emit(CallEvent::StateChanged {
                        channel_id: channel_id.clone(),
                        state: CallState::IncomingRinging,
                    }),
                ]
            }
            Some(session) if session.channel_id == *channel_id => {
                debug!(channel = %channel_id, "Duplicate invite; ignoring");
                Vec::new()
            }
            Some(session) => {
                info!(
                    caller = %from,
                    channel = %channel_id,
                    current = %session.channel_id,
                    "Busy; declining invite"
                );
                vec![
                    CallEffect::Send(SignalingMessage::Decline {
                        from: self.local.clone(),
                        to: from.clone(),
                        channel_id: channel_id.clone(),
                        reason: reasons::BUSY.into(),
                    }),
                    CallEffect::Emit(CallEvent::BusyRejected {
                        channel_id: channel_id.clone(),
                        caller: from.clone(),
                    }),
                ]
            }
        }
    }

    fn on_ring_timeout(&mut self, channel_id: &ChannelId, now: DateTime<Utc>) -> Vec<CallEffect> {
        let Some(session) = self.current.as_ref() else {
            return Vec::new();
        };
        if session.channel_id != *channel_id || !session.state.is_ringing() {
            // Timer raced with a transition.
            return Vec::new();
        }

        info!(channel = %channel_id, peer = %session.peer(), "Ring timeout");
        let notify = match session.direction {
            Direction::Outgoing => SignalingMessage::End {
                from: self.local.clone(),
                to: session.callee.clone(),
                channel_id: channel_id.clone(),
                duration_seconds: 0,
                reason: Some(reasons::NO_ANSWER.into()),
            },
            Direction::Incoming => SignalingMessage::Decline {
                from: self.local.clone(),
                to: session.caller.clone(),
                channel_id: channel_id.clone(),
                reason: reasons::NO_ANSWER.into(),
            },
        };
        self.finish(vec![CallEffect::Send(notify)], EndReason::NoAnswer, now)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn require<'a>(
        current: &'a mut Option<CallSession>,
        expected: CallState,
        action: &'static str,
    ) -> Result<&'a mut CallSession, CallError> {
        match current.as_mut() {
            None => Err(CallError::NoActiveCall),
            Some(s) if s.state == expected => Ok(s),
            Some(s) => Err(CallError::InvalidState {
                action,
                state: s.state,
            }),
        }
    }

    /// Move the live session to `Ended`, append teardown effects after
    /// `effects`, and discard the session.
    fn finish(
        &mut self,
        mut effects: Vec<CallEffect>,
        reason: EndReason,
        now: DateTime<Utc>,
    ) -> Vec<CallEffect> {
        let Some(mut session) = self.current.take() else {
            return effects;
        };
        let channel_id = session.channel_id.clone();

        match session.state {
            CallState::OutgoingRinging | CallState::IncomingRinging => {
                effects.push(CallEffect::CancelRingTimer {
                    channel_id: channel_id.clone(),
                });
            }
            CallState::Active => {
                effects.push(CallEffect::StopMedia {
                    channel_id: channel_id.clone(),
                });
            }
            CallState::Idle | CallState::Ended => {}
        }

        session.state = CallState::Ended;
        session.ended_at = Some(now);
        session.duration_seconds = session.talk_seconds(now);
        session.end_reason = Some(reason.clone());
        info!(
            channel = %channel_id,
            peer = %session.peer(),
            reason = %reason,
            duration = session.duration_seconds.unwrap_or(0),
            "Call ended"
        );

        let summary = session.summary();
        effects.push(CallEffect::Emit(CallEvent::StateChanged {
            channel_id,
            state: CallState::Ended,
        }));
        effects.push(CallEffect::Emit(CallEvent::CallEnded(summary.clone())));
        effects.push(CallEffect::LogCall(summary));
        effects
    }
}
