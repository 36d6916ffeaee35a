//! # In-Memory Network
//!
//! Complete transport cores wired to each other through an in-process
//! fabric. Nothing is delivered while a core is running: plugins and route
//! selection only queue [`NetEvent`]s, and [`Network::run`] feeds them to
//! the receiving core one at a time, in order.
//!
//! ## Links
//!
//! Dialling an address opens a link with one session per side. The dialled
//! node sees the dialler under an inbound address carrying the dialler's
//! own raw bytes, so both directions of a link name the same endpoints.

use parking_lot::Mutex;
use shared_crypto::PeerKeyPair;
use shared_types::testing::{ControllableTimeSource, RecordingPeerInfo};
use shared_types::{
    Address, AddressProperties, Bandwidth, ClientEvent, NetworkType, PeerId, SendRequest,
    SendToken, SessionId, TimeSource, Timestamp, TransportError, TransportPlugins, WireMessage,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tc_01_blacklist::adapters::RecordingPolicyChannel;
use tc_02_ats_bridge::RouteSelectionService;
use transport_runtime::{ClientHandle, CoreConfig, ExternalPorts, TransportCore};

/// Transport name of every fabric address.
pub const TRANSPORT: &str = "tcp";

/// Bandwidth handed out with every suggestion.
pub const SUGGESTED_BANDWIDTH: Bandwidth = Bandwidth::new(64 * 1024);

/// Clock start shared by every node.
pub const START_MS: u64 = 10_000_000;

const MAX_EVENTS: usize = 10_000;

// =============================================================================
// EVENTS
// =============================================================================

/// Work queued for one node.
#[derive(Debug, Clone)]
pub enum NetEvent {
    SessionStart {
        node: usize,
        address: Address,
        session: SessionId,
    },
    SessionEnd {
        node: usize,
        address: Address,
        session: SessionId,
    },
    Deliver {
        from: usize,
        node: usize,
        address: Address,
        session: SessionId,
        bytes: Vec<u8>,
    },
    SendComplete {
        node: usize,
        token: SendToken,
        bytes: usize,
    },
    Suggestion {
        node: usize,
        address: Address,
        session: Option<SessionId>,
    },
}

/// One end of a link.
#[derive(Debug, Clone)]
struct LinkEnd {
    /// Node at the other end.
    remote: usize,
    /// Session the other end uses.
    remote_session: SessionId,
    /// How the other end sees us.
    seen_as: Address,
}

#[derive(Debug, Default)]
struct FabricState {
    events: VecDeque<NetEvent>,
    links: HashMap<(usize, SessionId), LinkEnd>,
    sessions: HashMap<(usize, Address), SessionId>,
    /// (peer, raw) of every endpoint, by node.
    endpoints: HashMap<(PeerId, Vec<u8>), usize>,
    /// Every delivered message: (from, to, bytes).
    traffic: Vec<(usize, usize, Vec<u8>)>,
}

/// Shared state of every plugin and route selection in the network.
#[derive(Debug, Default)]
pub struct Fabric {
    state: Mutex<FabricState>,
    next_session: AtomicU64,
}

impl Fabric {
    fn push(&self, event: NetEvent) {
        self.state.lock().events.push_back(event);
    }

    fn pop(&self) -> Option<NetEvent> {
        self.state.lock().events.pop_front()
    }

    fn session_id(&self) -> SessionId {
        SessionId::new(1_000 + self.next_session.fetch_add(1, Ordering::SeqCst))
    }

    /// Tear down the link `session` of `node` belongs to and report the
    /// loss to both sides.
    fn sever(&self, node: usize, session: SessionId) -> bool {
        let mut state = self.state.lock();
        let Some(end) = state.links.remove(&(node, session)) else {
            return false;
        };
        let other = state.links.remove(&(end.remote, end.remote_session));
        state.sessions.retain(|(n, _), s| {
            !((*n == node && *s == session) || (*n == end.remote && *s == end.remote_session))
        });
        if let Some(other) = other {
            state.events.push_back(NetEvent::SessionEnd {
                node,
                address: other.seen_as,
                session,
            });
        }
        state.events.push_back(NetEvent::SessionEnd {
            node: end.remote,
            address: end.seen_as,
            session: end.remote_session,
        });
        true
    }
}

// =============================================================================
// TRANSPORT PLUGIN
// =============================================================================

/// The transport plugin of one node.
#[derive(Debug)]
pub struct MemoryPlugin {
    node: usize,
    peer: PeerId,
    own: Mutex<Vec<Vec<u8>>>,
    fabric: Arc<Fabric>,
}

impl MemoryPlugin {
    fn open_link(&self, address: &Address) -> Option<SessionId> {
        let own_raw = self.own.lock().first().cloned()?;
        let mut state = self.fabric.state.lock();
        let remote = *state
            .endpoints
            .get(&(address.peer, address.raw.clone()))?;
        let local_session = self.fabric.session_id();
        let remote_session = self.fabric.session_id();
        let seen_as = Address::inbound(self.peer, TRANSPORT, own_raw);

        state.links.insert(
            (self.node, local_session),
            LinkEnd {
                remote,
                remote_session,
                seen_as: seen_as.clone(),
            },
        );
        state.links.insert(
            (remote, remote_session),
            LinkEnd {
                remote: self.node,
                remote_session: local_session,
                seen_as: address.clone(),
            },
        );
        state
            .sessions
            .insert((self.node, address.clone()), local_session);
        state
            .sessions
            .insert((remote, seen_as.clone()), remote_session);
        state.events.push_back(NetEvent::SessionStart {
            node: self.node,
            address: address.clone(),
            session: local_session,
        });
        state.events.push_back(NetEvent::SessionStart {
            node: remote,
            address: seen_as,
            session: remote_session,
        });
        Some(local_session)
    }
}

impl TransportPlugins for MemoryPlugin {
    fn send(&self, request: SendRequest) -> Result<(), TransportError> {
        let mut state = self.fabric.state.lock();
        let end = state
            .links
            .get(&(self.node, request.session))
            .cloned()
            .ok_or(TransportError::SessionGone)?;
        let bytes = request.payload.len();
        state
            .traffic
            .push((self.node, end.remote, request.payload.clone()));
        state.events.push_back(NetEvent::Deliver {
            from: self.node,
            node: end.remote,
            address: end.seen_as,
            session: end.remote_session,
            bytes: request.payload,
        });
        if let Some(token) = request.token {
            state.events.push_back(NetEvent::SendComplete {
                node: self.node,
                token,
                bytes,
            });
        }
        Ok(())
    }

    fn get_session(&self, address: &Address) -> Option<SessionId> {
        let existing = self
            .fabric
            .state
            .lock()
            .sessions
            .get(&(self.node, address.clone()))
            .copied();
        if existing.is_some() || address.inbound {
            return existing;
        }
        self.open_link(address)
    }

    fn disconnect_session(&self, _address: &Address, session: SessionId) {
        self.fabric.sever(self.node, session);
    }

    fn network_type(&self, _address: &Address, _session: SessionId) -> NetworkType {
        NetworkType::Lan
    }

    fn check_address(&self, transport: &str, raw: &[u8]) -> bool {
        transport == TRANSPORT && self.own.lock().iter().any(|r| r.as_slice() == raw)
    }
}

// =============================================================================
// ROUTE SELECTION
// =============================================================================

/// Route selection that suggests the first usable address right away.
///
/// Validated addresses are preferred over inbound ones; a peer asked about
/// before any address is known gets a suggestion as soon as one is added.
/// Each request is answered once, so losing a session does not bring a new
/// suggestion on its own.
#[derive(Debug)]
pub struct ImmediateRoutes {
    node: usize,
    fabric: Arc<Fabric>,
    known: Mutex<HashMap<PeerId, Vec<(Address, Option<SessionId>)>>>,
    waiting: Mutex<HashSet<PeerId>>,
}

impl ImmediateRoutes {
    fn best(&self, peer: &PeerId) -> Option<(Address, Option<SessionId>)> {
        let known = self.known.lock();
        let candidates = known.get(peer)?;
        candidates
            .iter()
            .find(|(address, _)| !address.inbound)
            .or_else(|| candidates.iter().find(|(_, session)| session.is_some()))
            .cloned()
    }

    fn offer(&self, peer: &PeerId) {
        if !self.waiting.lock().contains(peer) {
            return;
        }
        if let Some((address, session)) = self.best(peer) {
            self.waiting.lock().remove(peer);
            self.fabric.push(NetEvent::Suggestion {
                node: self.node,
                address,
                session,
            });
        }
    }

    fn set_session(&self, address: &Address, session: Option<SessionId>) {
        if let Some(list) = self.known.lock().get_mut(&address.peer) {
            for entry in list.iter_mut().filter(|(a, _)| a == address) {
                entry.1 = session;
            }
        }
    }
}

impl RouteSelectionService for ImmediateRoutes {
    fn address_add(&self, address: &Address, session: Option<SessionId>, _props: &AddressProperties) {
        {
            let mut known = self.known.lock();
            let list = known.entry(address.peer).or_default();
            list.retain(|(a, _)| a != address);
            list.push((address.clone(), session));
        }
        self.offer(&address.peer);
    }

    fn address_update(&self, _address: &Address, _session: Option<SessionId>, _props: &AddressProperties) {}

    fn address_add_session(&self, address: &Address, session: SessionId) {
        self.set_session(address, Some(session));
        self.offer(&address.peer);
    }

    fn address_del_session(&self, address: &Address, _session: SessionId) {
        self.set_session(address, None);
    }

    fn address_destroy(&self, address: &Address) {
        if let Some(list) = self.known.lock().get_mut(&address.peer) {
            list.retain(|(a, _)| a != address);
        }
    }

    fn suggest(&self, peer: &PeerId) {
        self.waiting.lock().insert(*peer);
        self.offer(peer);
    }

    fn suggest_cancel(&self, peer: &PeerId) {
        self.waiting.lock().remove(peer);
    }

    fn reset_backoff(&self, _peer: &PeerId) {}
}

// =============================================================================
// NODES
// =============================================================================

/// One complete transport core and its collaborators.
pub struct Node {
    pub core: Arc<TransportCore>,
    pub keypair: PeerKeyPair,
    pub plugin: Arc<MemoryPlugin>,
    pub policy: Arc<RecordingPolicyChannel>,
    pub peerinfo: Arc<RecordingPeerInfo>,
    /// Subscription receiving every client event of the node.
    pub client: ClientHandle,
}

impl Node {
    /// Identity of the node.
    pub fn peer(&self) -> PeerId {
        self.keypair.peer_id()
    }

    /// The address other nodes dial.
    pub fn address(&self) -> Address {
        Address::new(self.peer(), TRANSPORT, raw_for(self.plugin.node, 0))
    }

    /// Take every client event since the last call.
    pub fn events(&self) -> Vec<ClientEvent> {
        self.core.clients().drain(self.client)
    }
}

fn raw_for(node: usize, endpoint: usize) -> Vec<u8> {
    format!("10.0.{endpoint}.{}:2086", node + 1).into_bytes()
}

/// A set of nodes sharing one fabric and one clock.
pub struct Network {
    pub nodes: Vec<Node>,
    pub time: Arc<ControllableTimeSource>,
    fabric: Arc<Fabric>,
}

impl Network {
    /// `count` nodes with default configuration.
    pub fn new(count: usize) -> Self {
        Self::with_configs((0..count).map(|_| CoreConfig::default()).collect())
    }

    /// One node per configuration.
    pub fn with_configs(configs: Vec<CoreConfig>) -> Self {
        let fabric = Arc::new(Fabric::default());
        let time = Arc::new(ControllableTimeSource::new(START_MS));
        let nodes = configs
            .into_iter()
            .enumerate()
            .map(|(node, config)| Self::build_node(node, config, &fabric, &time))
            .collect();
        let network = Self {
            nodes,
            time,
            fabric,
        };
        for node in 0..network.nodes.len() {
            network.add_endpoint(node, raw_for(node, 0));
        }
        network
    }

    fn build_node(
        node: usize,
        config: CoreConfig,
        fabric: &Arc<Fabric>,
        time: &Arc<ControllableTimeSource>,
    ) -> Node {
        let keypair = PeerKeyPair::from_seed([node as u8 + 1; 32]);
        let plugin = Arc::new(MemoryPlugin {
            node,
            peer: keypair.peer_id(),
            own: Mutex::new(Vec::new()),
            fabric: fabric.clone(),
        });
        let routes = Arc::new(ImmediateRoutes {
            node,
            fabric: fabric.clone(),
            known: Mutex::new(HashMap::new()),
            waiting: Mutex::new(HashSet::new()),
        });
        let policy = Arc::new(RecordingPolicyChannel::new());
        let peerinfo = Arc::new(RecordingPeerInfo::new());
        let ports = ExternalPorts {
            transport: plugin.clone(),
            route: routes,
            policy: policy.clone(),
            peerinfo: peerinfo.clone(),
            time: time.clone(),
        };
        let core = Arc::new(TransportCore::new(
            config,
            PeerKeyPair::from_seed(keypair.to_seed()),
            ports,
        ));
        let client = core.clients().subscribe();
        Node {
            core,
            keypair,
            plugin,
            policy,
            peerinfo,
            client,
        }
    }

    /// Give `node` another address of its own. Returns the address.
    pub fn add_endpoint(&self, node: usize, raw: Vec<u8>) -> Address {
        let peer = self.nodes[node].peer();
        self.nodes[node].plugin.own.lock().push(raw.clone());
        self.fabric
            .state
            .lock()
            .endpoints
            .insert((peer, raw.clone()), node);
        self.nodes[node].core.add_own_address(TRANSPORT, &raw);
        Address::new(peer, TRANSPORT, raw)
    }

    /// The `index`-th extra address for `node`.
    pub fn extra_endpoint(&self, node: usize, index: usize) -> Address {
        self.add_endpoint(node, raw_for(node, index + 1))
    }

    /// Deliver queued events until the network is quiet. Returns how many
    /// were processed.
    pub fn run(&self) -> usize {
        let mut processed = 0;
        while let Some(event) = self.fabric.pop() {
            processed += 1;
            assert!(processed < MAX_EVENTS, "network did not settle");
            self.apply(event);
        }
        processed
    }

    fn apply(&self, event: NetEvent) {
        match event {
            NetEvent::SessionStart {
                node,
                address,
                session,
            } => self.nodes[node].core.on_session_start(&address, session),
            NetEvent::SessionEnd {
                node,
                address,
                session,
            } => self.nodes[node].core.on_session_end(&address, session),
            NetEvent::Deliver {
                node,
                address,
                session,
                bytes,
                ..
            } => {
                self.nodes[node].core.on_receive(&address, session, &bytes);
            }
            NetEvent::SendComplete { node, token, bytes } => {
                self.nodes[node].core.on_send_complete(token, true, bytes)
            }
            NetEvent::Suggestion {
                node,
                address,
                session,
            } => self.nodes[node].core.on_suggestion(
                &address,
                session,
                SUGGESTED_BANDWIDTH,
                SUGGESTED_BANDWIDTH,
            ),
        }
    }

    /// Advance the shared clock, tick every core and settle.
    pub fn advance(&self, by: Duration) {
        self.time.advance(by);
        for node in &self.nodes {
            node.core.tick();
        }
        self.run();
    }

    /// Current time.
    pub fn now(&self) -> Timestamp {
        self.time.now()
    }

    /// Make `node` learn `address` and validate it.
    pub fn learn(&self, node: usize, address: &Address) {
        let expiration = self.now().saturating_add(Duration::from_secs(3_600));
        self.nodes[node].core.add_peer_address(address, expiration);
        self.run();
    }

    /// Queue a route-selection suggestion for `node`.
    pub fn suggest(&self, node: usize, address: &Address, session: Option<SessionId>) {
        self.fabric.push(NetEvent::Suggestion {
            node,
            address: address.clone(),
            session,
        });
    }

    /// Session `node` uses for `address`, if a link is open.
    pub fn session_of(&self, node: usize, address: &Address) -> Option<SessionId> {
        self.fabric
            .state
            .lock()
            .sessions
            .get(&(node, address.clone()))
            .copied()
    }

    /// Break a link from outside, as a failing transport would.
    pub fn sever(&self, node: usize, session: SessionId) -> bool {
        self.fabric.sever(node, session)
    }

    /// Every message delivered from `from` to `to` so far, decoded.
    pub fn messages(&self, from: usize, to: usize) -> Vec<WireMessage> {
        self.fabric
            .state
            .lock()
            .traffic
            .iter()
            .filter(|(f, t, _)| *f == from && *t == to)
            .flat_map(|(_, _, bytes)| WireMessage::decode_all(bytes).unwrap_or_default())
            .collect()
    }

    /// Forget recorded traffic.
    pub fn clear_traffic(&self) {
        self.fabric.state.lock().traffic.clear();
    }

    /// Connect `a` and `b` from `a`'s side after `a` validated `b`.
    pub fn connect_pair(&self, a: usize, b: usize) {
        let target = self.nodes[b].address();
        self.learn(a, &target);
        self.nodes[a]
            .core
            .connect(&self.nodes[b].peer())
            .expect("connect request refused");
        self.run();
    }
}
