//! Static denylist.
//!
//! Loaded from configuration. A peer either is denied on every transport
//! or on a set of named transports; the peer-wide form always wins.

use shared_types::PeerId;
use std::collections::{HashMap, HashSet};

/// What a denylist entry covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyScope {
    /// Every transport.
    AllTransports,
    /// Only the named transports.
    Transports(HashSet<String>),
}

/// Peers denied by local configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticDenylist {
    entries: HashMap<PeerId, DenyScope>,
}

impl StaticDenylist {
    /// Create an empty denylist.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Build from `(peer, transport)` pairs.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a (PeerId, Option<String>)>) -> Self {
        let mut list = Self::new();
        for (peer, transport) in entries {
            list.add(*peer, transport.as_deref());
        }
        list
    }

    /// Deny `peer` on `transport`, or on every transport for `None`.
    pub fn add(&mut self, peer: PeerId, transport: Option<&str>) {
        match transport {
            None => {
                self.entries.insert(peer, DenyScope::AllTransports);
            }
            Some(name) => match self
                .entries
                .entry(peer)
                .or_insert_with(|| DenyScope::Transports(HashSet::new()))
            {
                DenyScope::AllTransports => {}
                DenyScope::Transports(set) => {
                    set.insert(name.to_string());
                }
            },
        }
    }

    /// Drop every entry for `peer`.
    pub fn remove(&mut self, peer: &PeerId) -> bool {
        self.entries.remove(peer).is_some()
    }

    /// Is `peer` denied for this question?
    ///
    /// A transport-specific entry only answers questions about that
    /// transport; a question about the peer in general (`None`) is denied
    /// only by a peer-wide entry.
    pub fn is_denied(&self, peer: &PeerId, transport: Option<&str>) -> bool {
        match (self.entries.get(peer), transport) {
            (None, _) => false,
            (Some(DenyScope::AllTransports), _) => true,
            (Some(DenyScope::Transports(set)), Some(name)) => set.contains(name),
            (Some(DenyScope::Transports(_)), None) => false,
        }
    }

    /// Number of peers with an entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is denied.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
