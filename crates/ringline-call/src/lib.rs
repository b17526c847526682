//! ringline-call: client side of a call.
//!
//! `CallMachine` decides, `CallHandle` drives it, `signaling` talks to the
//! relay, and `media` hands an answered call to the external transport.

pub mod call;
pub mod call_log;
pub mod media;
pub mod signaling;

pub use call::{
    CallDeps, CallError, CallEvent, CallHandle, CallMachine, CallSession, CallState, CallSummary,
    Direction, EndReason,
};
pub use call_log::{CallLog, TracingCallLog};
pub use media::{
    CredentialService, HttpCredentialService, MediaAdapter, MediaEvent, MediaSettings,
    MediaTransport, SignalingOnlyTransport,
};
pub use signaling::{SignalSink, SignalingClient, SignalingConfig, SignalingEvent};
