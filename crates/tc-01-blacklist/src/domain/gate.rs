//! Policy-client round-robin.
//!
//! An explicit step machine: every input (new check, client reply, client
//! join/leave, cancellation, abort) advances the affected checks and
//! returns the resulting [`GateAction`]s. The caller sends the queries and
//! delivers the verdicts; the gate itself performs no I/O.
//!
//! ## Invariants
//!
//! - A client has at most one query in flight.
//! - A check is positioned at exactly one client and is dispatched to it
//!   at most once per position.
//! - Waiting checks are dispatched in creation order (`CheckId` order).
//! - A check produces exactly one verdict, unless it is cancelled, in which
//!   case it produces none.

use shared_types::{Address, AdmissionRequest, CheckId, PeerId, SessionId, Verdict};
use std::collections::BTreeMap;

use super::errors::BlacklistError;

/// Handle of a connected policy client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

/// Work produced by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateAction {
    /// Ask `client` about `peer`.
    Query {
        client: ClientId,
        check: CheckId,
        peer: PeerId,
        transport: Option<String>,
    },
    /// Deliver the final answer for `check`.
    Verdict { check: CheckId, verdict: Verdict },
}

/// Snapshot of gate load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStats {
    /// Connected policy clients.
    pub clients: usize,
    /// Checks awaiting a verdict.
    pub pending_checks: usize,
    /// Queries currently in flight.
    pub in_flight: usize,
}

#[derive(Debug, Clone)]
struct PendingCheck {
    request: AdmissionRequest,
    /// Client the check must be approved by next.
    position: ClientId,
    /// Query sent to `position`, reply outstanding.
    dispatched: bool,
}

#[derive(Debug, Clone)]
struct ClientSlot {
    id: ClientId,
    in_flight: Option<CheckId>,
}

/// Round-robin over connected policy clients.
#[derive(Debug, Default)]
pub struct RoundRobinGate {
    /// Connection order.
    clients: Vec<ClientSlot>,
    checks: BTreeMap<CheckId, PendingCheck>,
    next_check: u64,
}

impl RoundRobinGate {
    /// Create a gate with no clients.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when at least one policy client is connected.
    pub fn has_clients(&self) -> bool {
        !self.clients.is_empty()
    }

    /// True while `check` awaits a verdict.
    pub fn is_pending(&self, check: CheckId) -> bool {
        self.checks.contains_key(&check)
    }

    /// Load snapshot.
    pub fn stats(&self) -> GateStats {
        GateStats {
            clients: self.clients.len(),
            pending_checks: self.checks.len(),
            in_flight: self.clients.iter().filter(|c| c.in_flight.is_some()).count(),
        }
    }

    /// Register a policy client at the end of the rotation.
    pub fn add_client(&mut self, id: ClientId) -> Result<Vec<GateAction>, BlacklistError> {
        if self.clients.iter().any(|c| c.id == id) {
            return Err(BlacklistError::DuplicateClient(id));
        }
        self.clients.push(ClientSlot {
            id,
            in_flight: None,
        });
        Ok(self.pump())
    }

    /// Remove a client. Checks waiting on it (including the one in flight)
    /// move on to the next client, or are allowed if it was the last.
    pub fn remove_client(&mut self, id: ClientId) -> Result<Vec<GateAction>, BlacklistError> {
        let next = self.next_client_after(id)?;
        self.clients.retain(|c| c.id != id);

        let mut actions = Vec::new();
        let affected: Vec<CheckId> = self
            .checks
            .iter()
            .filter(|(_, c)| c.position == id)
            .map(|(check, _)| *check)
            .collect();
        for check in affected {
            self.advance(check, next, &mut actions);
        }
        actions.extend(self.pump());
        Ok(actions)
    }

    /// Start a check. The caller must have verified that clients exist.
    pub fn start(&mut self, request: AdmissionRequest) -> (CheckId, Vec<GateAction>) {
        self.next_check += 1;
        let id = CheckId(self.next_check);
        match self.clients.first() {
            Some(first) => {
                let position = first.id;
                self.checks.insert(
                    id,
                    PendingCheck {
                        request,
                        position,
                        dispatched: false,
                    },
                );
                (id, self.pump())
            }
            None => (
                id,
                vec![GateAction::Verdict {
                    check: id,
                    verdict: Verdict::Allowed,
                }],
            ),
        }
    }

    /// Apply a client's answer to the query it has in flight.
    pub fn on_reply(
        &mut self,
        client: ClientId,
        check: CheckId,
        allowed: bool,
    ) -> Result<Vec<GateAction>, BlacklistError> {
        let next = self.next_client_after(client)?;
        let slot = self
            .clients
            .iter_mut()
            .find(|c| c.id == client)
            .ok_or(BlacklistError::UnknownClient(client))?;
        if slot.in_flight != Some(check) {
            return Err(BlacklistError::UnexpectedReply { client, check });
        }
        slot.in_flight = None;

        let mut actions = Vec::new();
        if allowed {
            self.advance(check, next, &mut actions);
        } else if self.checks.remove(&check).is_some() {
            actions.push(GateAction::Verdict {
                check,
                verdict: Verdict::Denied,
            });
        }
        actions.extend(self.pump());
        Ok(actions)
    }

    /// Forget a check without a verdict, freeing its client slot.
    pub fn cancel(&mut self, check: CheckId) -> Vec<GateAction> {
        if self.checks.remove(&check).is_none() {
            return Vec::new();
        }
        self.release_slot(check);
        self.pump()
    }

    /// Abort every check about `address` (and `session`, if given).
    pub fn abort_matching(
        &mut self,
        address: &Address,
        session: Option<SessionId>,
    ) -> Vec<GateAction> {
        let matching: Vec<CheckId> = self
            .checks
            .iter()
            .filter(|(_, c)| {
                c.request.address.as_ref() == Some(address)
                    && (session.is_none() || c.request.session == session)
            })
            .map(|(check, _)| *check)
            .collect();

        let mut actions = Vec::new();
        for check in matching {
            self.checks.remove(&check);
            self.release_slot(check);
            actions.push(GateAction::Verdict {
                check,
                verdict: Verdict::Aborted,
            });
        }
        actions.extend(self.pump());
        actions
    }

    // =========================================================================
    // STEPPING
    // =========================================================================

    fn next_client_after(&self, id: ClientId) -> Result<Option<ClientId>, BlacklistError> {
        let idx = self
            .clients
            .iter()
            .position(|c| c.id == id)
            .ok_or(BlacklistError::UnknownClient(id))?;
        Ok(self.clients.get(idx + 1).map(|c| c.id))
    }

    /// Move `check` to `next`, or allow it when the rotation is exhausted.
    fn advance(&mut self, check: CheckId, next: Option<ClientId>, actions: &mut Vec<GateAction>) {
        match next {
            Some(client) => {
                if let Some(pending) = self.checks.get_mut(&check) {
                    pending.position = client;
                    pending.dispatched = false;
                }
            }
            None => {
                if self.checks.remove(&check).is_some() {
                    actions.push(GateAction::Verdict {
                        check,
                        verdict: Verdict::Allowed,
                    });
                }
            }
        }
    }

    fn release_slot(&mut self, check: CheckId) {
        for slot in &mut self.clients {
            if slot.in_flight == Some(check) {
                slot.in_flight = None;
            }
        }
    }

    /// Give every idle client its oldest waiting check.
    fn pump(&mut self) -> Vec<GateAction> {
        let mut actions = Vec::new();
        for slot in &mut self.clients {
            if slot.in_flight.is_some() {
                continue;
            }
            let waiting = self
                .checks
                .iter_mut()
                .find(|(_, c)| c.position == slot.id && !c.dispatched);
            if let Some((check, pending)) = waiting {
                pending.dispatched = true;
                slot.in_flight = Some(*check);
                actions.push(GateAction::Query {
                    client: slot.id,
                    check: *check,
                    peer: pending.request.peer,
                    transport: pending.request.transport.clone(),
                });
            }
        }
        actions
    }
}
