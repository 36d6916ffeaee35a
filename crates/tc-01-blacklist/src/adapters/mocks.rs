//! Recording policy channel.

use parking_lot::Mutex;

use crate::ports::{PolicyClientChannel, PolicyQuery};

/// Keeps every query so tests (and the in-memory harness) can answer them.
#[derive(Debug, Default)]
pub struct RecordingPolicyChannel {
    queries: Mutex<Vec<PolicyQuery>>,
}

impl RecordingPolicyChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all queries sent so far.
    pub fn take(&self) -> Vec<PolicyQuery> {
        std::mem::take(&mut *self.queries.lock())
    }

    /// Number of queries not yet taken.
    pub fn len(&self) -> usize {
        self.queries.lock().len()
    }

    /// True when no query is waiting.
    pub fn is_empty(&self) -> bool {
        self.queries.lock().is_empty()
    }
}

impl PolicyClientChannel for RecordingPolicyChannel {
    fn query(&self, query: PolicyQuery) {
        self.queries.lock().push(query);
    }
}
