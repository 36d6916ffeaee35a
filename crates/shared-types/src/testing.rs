//! # Test Utilities
//!
//! Recording implementations of the shared ports and a clock tests can
//! advance. Every recorder keeps calls in order and hands them out with
//! `take()`.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::entities::{
    Address, AddressProperties, NetworkType, PeerId, SessionId, Timestamp,
};
use crate::errors::TransportError;
use crate::events::ClientEvent;
use crate::ports::{
    Admission, AdmissionControl, AdmissionRequest, AddressRegistry, CheckId, ClientNotifier,
    PeerInfoStore, SendRequest, TimeSource, TransportPlugins,
};
use crate::wire::WireMessage;

/// Creates a PeerId with first byte set to `val`, rest zeroed.
pub fn make_peer(val: u8) -> PeerId {
    let mut bytes = [0u8; 32];
    bytes[0] = val;
    PeerId::new(bytes)
}

// =============================================================================
// TIME
// =============================================================================

/// Thread-safe TimeSource for tests requiring time advancement.
/// Uses AtomicU64 to allow multiple readers while supporting `advance()`.
#[derive(Debug)]
pub struct ControllableTimeSource {
    time: AtomicU64,
}

impl ControllableTimeSource {
    /// Clock starting at `initial_ms`.
    pub fn new(initial_ms: u64) -> Self {
        Self {
            time: AtomicU64::new(initial_ms),
        }
    }

    /// Advances the internal clock.
    pub fn advance(&self, by: Duration) {
        self.time
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl TimeSource for ControllableTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.time.load(Ordering::SeqCst))
    }
}

// =============================================================================
// TRANSPORT PLUGINS
// =============================================================================

/// Transport plugins that record sends and hand out scripted sessions.
#[derive(Debug)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SendRequest>>,
    sessions: Mutex<HashMap<Address, SessionId>>,
    own: Mutex<HashSet<(String, Vec<u8>)>>,
    failing: Mutex<HashSet<SessionId>>,
    disconnected: Mutex<Vec<(Address, SessionId)>>,
    auto_sessions: bool,
    next_session: AtomicU64,
    network: NetworkType,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    /// Plugins that open a fresh session for any address asked about.
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            sessions: Mutex::new(HashMap::new()),
            own: Mutex::new(HashSet::new()),
            failing: Mutex::new(HashSet::new()),
            disconnected: Mutex::new(Vec::new()),
            auto_sessions: true,
            next_session: AtomicU64::new(100),
            network: NetworkType::Lan,
        }
    }

    /// Plugins that only know the sessions added with [`Self::add_session`].
    pub fn without_auto_sessions() -> Self {
        Self {
            auto_sessions: false,
            ..Self::new()
        }
    }

    /// Make `get_session(address)` return `session`.
    pub fn add_session(&self, address: &Address, session: SessionId) {
        self.sessions.lock().insert(address.clone(), session);
    }

    /// Make `check_address` accept this address as ours.
    pub fn add_own_address(&self, transport: &str, raw: &[u8]) {
        self.own.lock().insert((transport.to_string(), raw.to_vec()));
    }

    /// Make every send on `session` fail.
    pub fn fail_session(&self, session: SessionId) {
        self.failing.lock().insert(session);
    }

    /// Take every request sent so far.
    pub fn take_sent(&self) -> Vec<SendRequest> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Take every message sent so far, decoded.
    pub fn take_messages(&self) -> Vec<(Address, SessionId, WireMessage)> {
        self.take_sent()
            .into_iter()
            .flat_map(|req| {
                WireMessage::decode_all(&req.payload)
                    .unwrap_or_default()
                    .into_iter()
                    .map(move |m| (req.address.clone(), req.session, m))
            })
            .collect()
    }

    /// Sessions closed through `disconnect_session`.
    pub fn disconnected(&self) -> Vec<(Address, SessionId)> {
        self.disconnected.lock().clone()
    }
}

impl TransportPlugins for RecordingTransport {
    fn send(&self, request: SendRequest) -> Result<(), TransportError> {
        if self.failing.lock().contains(&request.session) {
            return Err(TransportError::SessionGone);
        }
        self.sent.lock().push(request);
        Ok(())
    }

    fn get_session(&self, address: &Address) -> Option<SessionId> {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get(address) {
            return Some(*session);
        }
        if !self.auto_sessions {
            return None;
        }
        let session = SessionId::new(self.next_session.fetch_add(1, Ordering::SeqCst));
        sessions.insert(address.clone(), session);
        Some(session)
    }

    fn disconnect_session(&self, address: &Address, session: SessionId) {
        self.disconnected.lock().push((address.clone(), session));
        let mut sessions = self.sessions.lock();
        if sessions.get(address) == Some(&session) {
            sessions.remove(address);
        }
    }

    fn network_type(&self, _address: &Address, _session: SessionId) -> NetworkType {
        self.network
    }

    fn check_address(&self, transport: &str, raw: &[u8]) -> bool {
        self.own
            .lock()
            .contains(&(transport.to_string(), raw.to_vec()))
    }
}

// =============================================================================
// ADMISSION
// =============================================================================

/// How [`ScriptedAdmission`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionMode {
    /// Everything allowed synchronously.
    AllowAll,
    /// Everything denied synchronously.
    DenyAll,
    /// Every request becomes a pending check.
    Pending,
}

/// Admission gate with a scripted answer.
#[derive(Debug)]
pub struct ScriptedAdmission {
    mode: Mutex<AdmissionMode>,
    denied: Mutex<Vec<(PeerId, Option<String>)>>,
    requests: Mutex<Vec<(CheckId, AdmissionRequest)>>,
    cancelled: Mutex<Vec<CheckId>>,
    next_check: AtomicU64,
}

impl ScriptedAdmission {
    /// Gate answering with `mode`.
    pub fn new(mode: AdmissionMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            denied: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            next_check: AtomicU64::new(1),
        }
    }

    /// Change the answer for later requests.
    pub fn set_mode(&self, mode: AdmissionMode) {
        *self.mode.lock() = mode;
    }

    /// Deny `peer` on `transport` (any transport for `None`) regardless of
    /// mode.
    pub fn deny(&self, peer: PeerId, transport: Option<&str>) {
        self.denied.lock().push((peer, transport.map(str::to_string)));
    }

    /// Pending checks issued so far.
    pub fn pending(&self) -> Vec<(CheckId, AdmissionRequest)> {
        self.requests.lock().clone()
    }

    /// Checks cancelled so far.
    pub fn cancelled(&self) -> Vec<CheckId> {
        self.cancelled.lock().clone()
    }
}

impl AdmissionControl for ScriptedAdmission {
    fn test_allowed(&self, request: AdmissionRequest) -> Admission {
        let denied = self.denied.lock().iter().any(|(peer, transport)| {
            *peer == request.peer
                && (transport.is_none() || *transport == request.transport)
        });
        if denied {
            return Admission::Denied;
        }
        match *self.mode.lock() {
            AdmissionMode::AllowAll => Admission::Allowed,
            AdmissionMode::DenyAll => Admission::Denied,
            AdmissionMode::Pending => {
                let check = CheckId(self.next_check.fetch_add(1, Ordering::SeqCst));
                self.requests.lock().push((check, request));
                Admission::Pending(check)
            }
        }
    }

    fn cancel(&self, check: CheckId) {
        self.cancelled.lock().push(check);
    }

    fn abort_matching(&self, _address: &Address, _session: Option<SessionId>) {}
}

// =============================================================================
// ADDRESS REGISTRY
// =============================================================================

/// One call made to the address registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryCall {
    AddInbound(Address, SessionId),
    AddAddress(Address, AddressProperties),
    NewSession(Address, SessionId),
    DelSession(Address, SessionId),
    Delay(Address, Duration),
    Distance(Address, u32),
    Network(Address, NetworkType),
    Utilization(Address, u32, u32),
    Expire(Address),
    Block(Address, Option<SessionId>),
    ResetBlock(Address, Option<SessionId>),
    Suggest(PeerId),
    CancelSuggest(PeerId),
}

/// Address registry that records calls and tracks what is known.
#[derive(Debug, Default)]
pub struct RecordingRegistry {
    calls: Mutex<Vec<RegistryCall>>,
    known: Mutex<HashSet<(Address, Option<SessionId>)>>,
}

impl RecordingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all calls made so far.
    pub fn take(&self) -> Vec<RegistryCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Calls made so far, without consuming them.
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls.lock().clone()
    }

    fn push(&self, call: RegistryCall) {
        self.calls.lock().push(call);
    }
}

impl AddressRegistry for RecordingRegistry {
    fn is_known(&self, address: &Address, session: Option<SessionId>) -> bool {
        self.known.lock().contains(&(address.clone(), session))
    }

    fn is_known_no_session(&self, address: &Address) -> bool {
        self.known.lock().iter().any(|(a, _)| a == address)
    }

    fn add_inbound(&self, address: &Address, session: SessionId, _props: AddressProperties) {
        self.known.lock().insert((address.clone(), Some(session)));
        self.push(RegistryCall::AddInbound(address.clone(), session));
    }

    fn add_address(&self, address: &Address, props: AddressProperties) {
        self.known.lock().insert((address.clone(), None));
        self.push(RegistryCall::AddAddress(address.clone(), props));
    }

    fn new_session(&self, address: &Address, session: SessionId) {
        let mut known = self.known.lock();
        if known.remove(&(address.clone(), None)) {
            known.insert((address.clone(), Some(session)));
        }
        drop(known);
        self.push(RegistryCall::NewSession(address.clone(), session));
    }

    fn del_session(&self, address: &Address, session: SessionId) -> bool {
        let mut known = self.known.lock();
        let removed = known.remove(&(address.clone(), Some(session)));
        if removed && !address.inbound {
            known.insert((address.clone(), None));
        }
        drop(known);
        self.push(RegistryCall::DelSession(address.clone(), session));
        removed && address.inbound
    }

    fn update_delay(&self, address: &Address, delay: Duration) {
        self.push(RegistryCall::Delay(address.clone(), delay));
    }

    fn update_distance(&self, address: &Address, distance: u32) {
        self.push(RegistryCall::Distance(address.clone(), distance));
    }

    fn update_network(&self, address: &Address, network: NetworkType) {
        self.push(RegistryCall::Network(address.clone(), network));
    }

    fn update_utilization(&self, address: &Address, bps_in: u32, bps_out: u32) {
        self.push(RegistryCall::Utilization(address.clone(), bps_in, bps_out));
    }

    fn expire_address(&self, address: &Address) {
        self.known.lock().retain(|(a, _)| a != address);
        self.push(RegistryCall::Expire(address.clone()));
    }

    fn block_address(&self, address: &Address, session: Option<SessionId>) {
        self.push(RegistryCall::Block(address.clone(), session));
    }

    fn reset_block(&self, address: &Address, session: Option<SessionId>) {
        self.push(RegistryCall::ResetBlock(address.clone(), session));
    }

    fn request_suggestions(&self, peer: &PeerId) {
        self.push(RegistryCall::Suggest(*peer));
    }

    fn cancel_suggestions(&self, peer: &PeerId) {
        self.push(RegistryCall::CancelSuggest(*peer));
    }
}

// =============================================================================
// CLIENTS AND PEER INFORMATION
// =============================================================================

/// Client notifier that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ClientEvent>>,
}

impl RecordingNotifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all events broadcast so far.
    pub fn take(&self) -> Vec<ClientEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl ClientNotifier for RecordingNotifier {
    fn broadcast(&self, event: ClientEvent) {
        self.events.lock().push(event);
    }
}

/// Peer-information store that keeps every write.
#[derive(Debug, Default)]
pub struct RecordingPeerInfo {
    stored: Mutex<Vec<(Address, Timestamp)>>,
}

impl RecordingPeerInfo {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything stored so far.
    pub fn stored(&self) -> Vec<(Address, Timestamp)> {
        self.stored.lock().clone()
    }
}

impl PeerInfoStore for RecordingPeerInfo {
    fn add_address(&self, address: &Address, expiration: Timestamp) {
        self.stored.lock().push((address.clone(), expiration));
    }
}
