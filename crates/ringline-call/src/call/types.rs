//! Call session types, machine inputs/outputs, and UI events.

use chrono::{DateTime, Utc};
use ringline_common::{reasons, ChannelId, Identity, SignalingMessage};

use crate::media::MediaEvent;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of the client's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    OutgoingRinging,
    IncomingRinging,
    Active,
    Ended,
}

impl CallState {
    pub fn is_ringing(&self) -> bool {
        matches!(
            self,
            CallState::OutgoingRinging | CallState::IncomingRinging
        )
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CallState::Idle => "idle",
            CallState::OutgoingRinging => "outgoing_ringing",
            CallState::IncomingRinging => "incoming_ringing",
            CallState::Active => "active",
            CallState::Ended => "ended",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Why a call reached `Ended`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Answered, then hung up by either side.
    Completed,
    /// Refused by the callee (`"declined"`, `"busy"`, ...).
    Declined(String),
    /// Abandoned while ringing.
    Cancelled,
    /// Ring timeout elapsed.
    NoAnswer,
    /// The relay could not reach the peer.
    Failed(String),
}

impl EndReason {
    /// Outcome string reported to the call log.
    pub fn outcome(&self) -> &'static str {
        match self {
            EndReason::Completed => "completed",
            EndReason::Declined(_) => "declined",
            EndReason::Cancelled => "cancelled",
            EndReason::NoAnswer => "no_answer",
            EndReason::Failed(_) => "failed",
        }
    }

    /// Map a peer's `decline` reason onto an end reason.
    pub(crate) fn from_decline(reason: &str) -> Self {
        if reason == reasons::NO_ANSWER {
            EndReason::NoAnswer
        } else {
            EndReason::Declined(reason.to_string())
        }
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndReason::Completed => f.write_str("completed"),
            EndReason::Declined(reason) => write!(f, "declined ({reason})"),
            EndReason::Cancelled => f.write_str("cancelled"),
            EndReason::NoAnswer => f.write_str(reasons::NO_ANSWER),
            EndReason::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The one call a client is engaged in.
#[derive(Debug, Clone)]
pub struct CallSession {
    pub channel_id: ChannelId,
    pub caller: Identity,
    pub callee: Identity,
    pub direction: Direction,
    pub state: CallState,
    /// Display name the caller advertised; set on incoming calls.
    pub caller_display_name: Option<String>,
    pub started_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<u64>,
    pub end_reason: Option<EndReason>,
}

impl CallSession {
    pub(crate) fn outgoing(local: &Identity, to: &Identity, now: DateTime<Utc>) -> Self {
        Self {
            channel_id: ChannelId::new(),
            caller: local.clone(),
            callee: to.clone(),
            direction: Direction::Outgoing,
            state: CallState::OutgoingRinging,
            caller_display_name: None,
            started_at: now,
            answered_at: None,
            ended_at: None,
            duration_seconds: None,
            end_reason: None,
        }
    }

    pub(crate) fn incoming(
        local: &Identity,
        from: &Identity,
        channel_id: &ChannelId,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            channel_id: channel_id.clone(),
            caller: from.clone(),
            callee: local.clone(),
            direction: Direction::Incoming,
            state: CallState::IncomingRinging,
            caller_display_name: Some(display_name.to_string()),
            started_at: now,
            answered_at: None,
            ended_at: None,
            duration_seconds: None,
            end_reason: None,
        }
    }

    /// The other participant.
    pub fn peer(&self) -> &Identity {
        match self.direction {
            Direction::Outgoing => &self.callee,
            Direction::Incoming => &self.caller,
        }
    }

    /// Whole seconds between answer and `now`; `None` if never answered.
    pub(crate) fn talk_seconds(&self, now: DateTime<Utc>) -> Option<u64> {
        self.answered_at
            .map(|answered| (now - answered).num_seconds().max(0) as u64)
    }

    pub(crate) fn summary(&self) -> CallSummary {
        CallSummary {
            channel_id: self.channel_id.clone(),
            caller: self.caller.clone(),
            callee: self.callee.clone(),
            direction: self.direction,
            started_at: self.started_at,
            answered_at: self.answered_at,
            ended_at: self.ended_at.unwrap_or(self.started_at),
            duration_seconds: self.duration_seconds.unwrap_or(0),
            reason: self.end_reason.clone().unwrap_or(EndReason::Completed),
        }
    }
}

/// What remains of a session once it has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSummary {
    pub channel_id: ChannelId,
    pub caller: Identity,
    pub callee: Identity,
    pub direction: Direction,
    pub started_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    /// Zero when the call was never answered.
    pub duration_seconds: u64,
    pub reason: EndReason,
}

// ---------------------------------------------------------------------------
// Machine inputs and outputs
// ---------------------------------------------------------------------------

/// Everything that can drive a transition.
#[derive(Debug, Clone)]
pub enum CallInput {
    Dial { to: Identity },
    Accept,
    Decline,
    HangUp,
    Remote(SignalingMessage),
    RingTimeout { channel_id: ChannelId },
}

/// Side effects a transition asks its driver to perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum CallEffect {
    Send(SignalingMessage),
    ArmRingTimer { channel_id: ChannelId },
    CancelRingTimer { channel_id: ChannelId },
    StartMedia { channel_id: ChannelId },
    StopMedia { channel_id: ChannelId },
    Emit(CallEvent),
    LogCall(CallSummary),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted by the call system for the UI to consume.
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    StateChanged {
        channel_id: ChannelId,
        state: CallState,
    },
    IncomingCall {
        channel_id: ChannelId,
        caller: Identity,
        caller_display_name: String,
    },
    /// A second invite arrived while busy and was declined.
    BusyRejected {
        channel_id: ChannelId,
        caller: Identity,
    },
    CallEnded(CallSummary),
    Media {
        channel_id: ChannelId,
        event: MediaEvent,
    },
}
