use parking_lot::Mutex;
use shared_types::{Address, PeerId, SessionId, TimeSource};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{AddressRecord, AtsBridgeConfig};
use crate::ports::RouteSelectionService;

/// Bookkeeping layer between the transport core and the route-selection
/// service.
pub struct AtsBridge {
    pub(crate) config: AtsBridgeConfig,
    pub(crate) route: Arc<dyn RouteSelectionService>,
    pub(crate) time_source: Arc<dyn TimeSource>,
    /// Records per peer; a peer rarely has more than a handful.
    pub(crate) records: Mutex<HashMap<PeerId, Vec<AddressRecord>>>,
}

impl AtsBridge {
    /// Create a bridge with no known addresses.
    pub fn new(
        config: AtsBridgeConfig,
        route: Arc<dyn RouteSelectionService>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            route,
            time_source,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Records currently held for `peer`.
    pub fn records(&self, peer: &PeerId) -> Vec<AddressRecord> {
        self.records.lock().get(peer).cloned().unwrap_or_default()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.records.lock().values().map(Vec::len).sum()
    }

    /// True when nothing is known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Record for exactly this (address, session) pair.
pub(crate) fn find<'a>(
    records: &'a mut HashMap<PeerId, Vec<AddressRecord>>,
    address: &Address,
    session: Option<SessionId>,
) -> Option<&'a mut AddressRecord> {
    records
        .get_mut(&address.peer)?
        .iter_mut()
        .find(|r| r.address == *address && r.session == session)
}

/// Drop `peer`'s entry once its last record is gone.
pub(crate) fn prune(records: &mut HashMap<PeerId, Vec<AddressRecord>>, peer: &PeerId) {
    if records.get(peer).is_some_and(Vec::is_empty) {
        records.remove(peer);
    }
}
