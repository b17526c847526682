//! Call-log collaborator, notified once per ended call.

use tracing::info;

use crate::call::CallSummary;

/// Receives a summary of every ended call. Must not block.
pub trait CallLog: Send + Sync {
    fn record(&self, summary: &CallSummary);
}

/// Writes each call record as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCallLog;

impl CallLog for TracingCallLog {
    fn record(&self, summary: &CallSummary) {
        info!(
            target: "ringline::call_log",
            caller = %summary.caller,
            callee = %summary.callee,
            channel = %summary.channel_id,
            duration_seconds = summary.duration_seconds,
            outcome = summary.reason.outcome(),
            "Call record"
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Keeps every record for assertions.
    #[derive(Clone, Default)]
    pub(crate) struct MemoryCallLog {
        pub(crate) records: Arc<Mutex<Vec<CallSummary>>>,
    }

    impl MemoryCallLog {
        pub(crate) fn records(&self) -> Vec<CallSummary> {
            self.records.lock().unwrap().clone()
        }
    }

    impl CallLog for MemoryCallLog {
        fn record(&self, summary: &CallSummary) {
            self.records.lock().unwrap().push(summary.clone());
        }
    }
}
