use shared_types::{
    Address, Admission, AdmissionControl, AdmissionRequest, CheckId, PeerId, SessionId, Verdict,
};
use transport_telemetry::{log_event, log_peer_event, subsystem};

use super::core::BlacklistService;
use crate::domain::{BlacklistError, ClientId, GateStats};
use crate::ports::BlacklistApi;

impl AdmissionControl for BlacklistService {
    fn test_allowed(&self, request: AdmissionRequest) -> Admission {
        let peer = request.peer;
        self.step(|state| {
            if state
                .denylist
                .is_denied(&request.peer, request.transport.as_deref())
            {
                log_peer_event!(
                    debug,
                    subsystem::BLACKLIST,
                    "Denied by static entry",
                    peer,
                    transport = ?request.transport
                );
                return (Admission::Denied, Vec::new());
            }
            if !state.gate.has_clients() {
                return (Admission::Allowed, Vec::new());
            }
            let (check, actions) = state.gate.start(request);
            log_peer_event!(
                debug,
                subsystem::BLACKLIST,
                "Asking policy clients",
                peer,
                check = check.0
            );
            (Admission::Pending(check), actions)
        })
    }

    fn cancel(&self, check: CheckId) {
        self.step(|state| {
            // A verdict already queued for the check must not surface either
            state.verdicts.retain(|(c, _)| *c != check);
            ((), state.gate.cancel(check))
        })
    }

    fn abort_matching(&self, address: &Address, session: Option<SessionId>) {
        self.step(|state| ((), state.gate.abort_matching(address, session)))
    }
}

impl BlacklistApi for BlacklistService {
    fn add_client(&self, client: ClientId) -> Result<(), BlacklistError> {
        self.step(|state| match state.gate.add_client(client) {
            Ok(actions) => (Ok(()), actions),
            Err(e) => (Err(e), Vec::new()),
        })?;
        log_event!(info, subsystem::BLACKLIST, "Policy client joined", client = client.0);
        Ok(())
    }

    fn remove_client(&self, client: ClientId) -> Result<(), BlacklistError> {
        self.step(|state| match state.gate.remove_client(client) {
            Ok(actions) => (Ok(()), actions),
            Err(e) => (Err(e), Vec::new()),
        })?;
        log_event!(info, subsystem::BLACKLIST, "Policy client left", client = client.0);
        Ok(())
    }

    fn on_client_reply(
        &self,
        client: ClientId,
        check: CheckId,
        allowed: bool,
    ) -> Result<(), BlacklistError> {
        self.step(|state| match state.gate.on_reply(client, check, allowed) {
            Ok(actions) => (Ok(()), actions),
            Err(e) => (Err(e), Vec::new()),
        })
    }

    fn deny_static(&self, peer: PeerId, transport: Option<&str>) {
        self.state.lock().denylist.add(peer, transport);
        log_peer_event!(
            info,
            subsystem::BLACKLIST,
            "Static entry added",
            peer,
            transport = ?transport
        );
    }

    fn drain_verdicts(&self) -> Vec<(CheckId, Verdict)> {
        self.state.lock().verdicts.drain(..).collect()
    }

    fn stats(&self) -> GateStats {
        self.state.lock().gate.stats()
    }
}
