//! # Client Hub
//!
//! Fan-out of [`ClientEvent`]s to local clients.
//!
//! Every client has a bounded queue. A full queue drops payload events
//! (`Received`) and counts them; control events are always queued, so a
//! slow client never misses a state change.

use parking_lot::Mutex;
use shared_types::{ClientEvent, ClientNotifier, PeerId};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use transport_telemetry::{log_event, subsystem};

/// Handle of a subscribed local client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientHandle(pub u64);

#[derive(Debug)]
struct ClientQueue {
    events: VecDeque<ClientEvent>,
    /// Only events about these peers; `None` means all.
    peers: Option<Vec<PeerId>>,
    dropped: u64,
}

impl ClientQueue {
    fn wants(&self, event: &ClientEvent) -> bool {
        let Some(peers) = &self.peers else {
            return true;
        };
        let peer = match event {
            ClientEvent::Connected { peer, .. }
            | ClientEvent::Disconnected { peer }
            | ClientEvent::NeighbourChanged { peer, .. }
            | ClientEvent::QuotaAdvisory { peer, .. }
            | ClientEvent::SendComplete { peer, .. }
            | ClientEvent::Received { peer, .. } => peer,
            ClientEvent::ValidationChanged { address, .. }
            | ClientEvent::ValidationRemoved { address } => &address.peer,
        };
        peers.contains(peer)
    }
}

/// Bounded per-client event queues.
#[derive(Debug)]
pub struct ClientHub {
    capacity: usize,
    next_id: AtomicU64,
    clients: Mutex<BTreeMap<ClientHandle, ClientQueue>>,
    broadcasts: AtomicU64,
}

impl ClientHub {
    /// Hub whose clients buffer up to `capacity` events each.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            clients: Mutex::new(BTreeMap::new()),
            broadcasts: AtomicU64::new(0),
        }
    }

    /// Subscribe to every event.
    pub fn subscribe(&self) -> ClientHandle {
        self.subscribe_filtered(None)
    }

    /// Subscribe to events about `peers` only (`None` for all).
    pub fn subscribe_filtered(&self, peers: Option<Vec<PeerId>>) -> ClientHandle {
        let handle = ClientHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.clients.lock().insert(
            handle,
            ClientQueue {
                events: VecDeque::new(),
                peers,
                dropped: 0,
            },
        );
        log_event!(debug, subsystem::RUNTIME, "Client subscribed", client = handle.0);
        handle
    }

    /// Drop a client and its queue. Returns `false` if unknown.
    pub fn unsubscribe(&self, handle: ClientHandle) -> bool {
        self.clients.lock().remove(&handle).is_some()
    }

    /// Take every queued event of `handle`.
    pub fn drain(&self, handle: ClientHandle) -> Vec<ClientEvent> {
        self.clients
            .lock()
            .get_mut(&handle)
            .map(|q| q.events.drain(..).collect())
            .unwrap_or_default()
    }

    /// Payload events dropped for `handle` because its queue was full.
    pub fn dropped(&self, handle: ClientHandle) -> u64 {
        self.clients.lock().get(&handle).map_or(0, |q| q.dropped)
    }

    /// Number of subscribed clients.
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// No client subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events broadcast since creation.
    pub fn broadcasts(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }
}

impl ClientNotifier for ClientHub {
    fn broadcast(&self, event: ClientEvent) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        let control = event.is_control();
        let mut clients = self.clients.lock();
        for (handle, queue) in clients.iter_mut() {
            if !queue.wants(&event) {
                continue;
            }
            if !control && queue.events.len() >= self.capacity {
                queue.dropped += 1;
                log_event!(
                    trace,
                    subsystem::RUNTIME,
                    "Client queue full, payload dropped",
                    client = handle.0,
                    dropped = queue.dropped
                );
                continue;
            }
            queue.events.push_back(event.clone());
        }
    }
}
