//! Recording route-selection service.

use parking_lot::Mutex;
use shared_types::{Address, AddressProperties, PeerId, SessionId};

use crate::ports::RouteSelectionService;

/// One call made to the route-selection service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteCall {
    Add(Address, Option<SessionId>),
    Update(Address, AddressProperties),
    AddSession(Address, SessionId),
    DelSession(Address, SessionId),
    Destroy(Address),
    Suggest(PeerId),
    SuggestCancel(PeerId),
    ResetBackoff(PeerId),
}

/// Records every call in order.
#[derive(Debug, Default)]
pub struct RecordingRouteSelection {
    calls: Mutex<Vec<RouteCall>>,
}

impl RecordingRouteSelection {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all calls made so far.
    pub fn take(&self) -> Vec<RouteCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Peers with an active suggestion request, in request order.
    pub fn suggested(&self) -> Vec<PeerId> {
        let mut active: Vec<PeerId> = Vec::new();
        for call in self.calls.lock().iter() {
            match call {
                RouteCall::Suggest(p) if !active.contains(p) => active.push(*p),
                RouteCall::SuggestCancel(p) => active.retain(|x| x != p),
                _ => {}
            }
        }
        active
    }

    fn push(&self, call: RouteCall) {
        self.calls.lock().push(call);
    }
}

impl RouteSelectionService for RecordingRouteSelection {
    fn address_add(&self, address: &Address, session: Option<SessionId>, _props: &AddressProperties) {
        self.push(RouteCall::Add(address.clone(), session));
    }

    fn address_update(&self, address: &Address, _session: Option<SessionId>, props: &AddressProperties) {
        self.push(RouteCall::Update(address.clone(), *props));
    }

    fn address_add_session(&self, address: &Address, session: SessionId) {
        self.push(RouteCall::AddSession(address.clone(), session));
    }

    fn address_del_session(&self, address: &Address, session: SessionId) {
        self.push(RouteCall::DelSession(address.clone(), session));
    }

    fn address_destroy(&self, address: &Address) {
        self.push(RouteCall::Destroy(address.clone()));
    }

    fn suggest(&self, peer: &PeerId) {
        self.push(RouteCall::Suggest(*peer));
    }

    fn suggest_cancel(&self, peer: &PeerId) {
        self.push(RouteCall::SuggestCancel(*peer));
    }

    fn reset_backoff(&self, peer: &PeerId) {
        self.push(RouteCall::ResetBackoff(*peer));
    }
}
