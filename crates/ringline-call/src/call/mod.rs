//! Call state machine and its async controller.

mod controller;
mod error;
mod machine;
mod types;

#[cfg(test)]
mod scenarios;

pub use controller::{CallDeps, CallHandle};
pub use error::CallError;
pub use machine::CallMachine;
pub use types::{
    CallEffect, CallEvent, CallInput, CallSession, CallState, CallSummary, Direction, EndReason,
};
