use parking_lot::Mutex;
use shared_types::{CheckId, Verdict};
use std::collections::VecDeque;
use std::sync::Arc;
use transport_telemetry::{log_event, subsystem};

use crate::domain::{BlacklistConfig, GateAction, RoundRobinGate, StaticDenylist};
use crate::ports::{PolicyClientChannel, PolicyQuery};

pub(crate) struct GateState {
    pub(crate) denylist: StaticDenylist,
    pub(crate) gate: RoundRobinGate,
    pub(crate) verdicts: VecDeque<(CheckId, Verdict)>,
}

/// Blacklist gate service.
///
/// Shared between the neighbour and validation subsystems through
/// `Arc<dyn AdmissionControl>`, and driven by the host through
/// [`BlacklistApi`](crate::BlacklistApi).
pub struct BlacklistService {
    pub(crate) state: Mutex<GateState>,
    pub(crate) channel: Arc<dyn PolicyClientChannel>,
}

impl BlacklistService {
    /// Create the service with the configured static entries.
    pub fn new(config: &BlacklistConfig, channel: Arc<dyn PolicyClientChannel>) -> Self {
        let denylist = StaticDenylist::from_entries(&config.entries);
        log_event!(
            debug,
            subsystem::BLACKLIST,
            "Blacklist gate created",
            static_entries = denylist.len()
        );
        Self {
            state: Mutex::new(GateState {
                denylist,
                gate: RoundRobinGate::new(),
                verdicts: VecDeque::new(),
            }),
            channel,
        }
    }

    /// Carry out gate actions: queue verdicts under the lock, send queries
    /// after releasing it.
    pub(crate) fn apply(&self, state: &mut GateState, actions: Vec<GateAction>) -> Vec<PolicyQuery> {
        let mut queries = Vec::new();
        for action in actions {
            match action {
                GateAction::Query {
                    client,
                    check,
                    peer,
                    transport,
                } => queries.push(PolicyQuery {
                    client,
                    check,
                    peer,
                    transport,
                }),
                GateAction::Verdict { check, verdict } => {
                    log_event!(
                        debug,
                        subsystem::BLACKLIST,
                        "Check finished",
                        check = check.0,
                        verdict = ?verdict
                    );
                    state.verdicts.push_back((check, verdict));
                }
            }
        }
        queries
    }

    pub(crate) fn send_queries(&self, queries: Vec<PolicyQuery>) {
        for query in queries {
            self.channel.query(query);
        }
    }

    /// Run `f` on the gate and carry out what it produced.
    pub(crate) fn step<R>(
        &self,
        f: impl FnOnce(&mut GateState) -> (R, Vec<GateAction>),
    ) -> R {
        let queries;
        let result;
        {
            let mut state = self.state.lock();
            let (r, actions) = f(&mut state);
            queries = self.apply(&mut state, actions);
            result = r;
        }
        self.send_queries(queries);
        result
    }
}
