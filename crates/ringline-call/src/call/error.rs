use ringline_common::Identity;

use super::types::CallState;

/// Reasons a local call action is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("already in a call")]
    Busy,

    #[error("no call in progress")]
    NoActiveCall,

    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: CallState,
    },

    #[error("invalid call target: {0}")]
    InvalidTarget(Identity),

    #[error("call controller has shut down")]
    ControllerClosed,
}
