//! Our own addresses and the PONG signatures we hand out for them.

use shared_crypto::{PeerKeyPair, PeerSignature, SignaturePurpose};
use shared_types::{HelloEntry, HelloMessage, PongMessage, Timestamp};
use std::collections::HashMap;
use std::time::Duration;

/// Addresses our plugins listen on, advertised in our HELLO.
#[derive(Debug, Clone, Default)]
pub struct OwnAddresses {
    addresses: Vec<(String, Vec<u8>)>,
}

impl OwnAddresses {
    /// No addresses yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address; returns `false` if it was already present.
    pub fn add(&mut self, transport: &str, raw: &[u8]) -> bool {
        if self.contains(transport, raw) {
            return false;
        }
        self.addresses.push((transport.to_string(), raw.to_vec()));
        true
    }

    /// Remove an address; returns `false` if it was unknown.
    pub fn remove(&mut self, transport: &str, raw: &[u8]) -> bool {
        let before = self.addresses.len();
        self.addresses
            .retain(|(t, r)| !(t == transport && r.as_slice() == raw));
        before != self.addresses.len()
    }

    /// Is this one of ours?
    pub fn contains(&self, transport: &str, raw: &[u8]) -> bool {
        self.addresses
            .iter()
            .any(|(t, r)| t == transport && r.as_slice() == raw)
    }

    /// Number of addresses.
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// True when we have no address.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// HELLO advertising every address until `expiration`.
    pub fn hello(&self, peer: shared_types::PeerId, expiration: Timestamp) -> HelloMessage {
        HelloMessage {
            peer,
            entries: self
                .addresses
                .iter()
                .map(|(transport, raw)| HelloEntry {
                    transport: transport.clone(),
                    raw: raw.clone(),
                    expiration,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedSignature {
    signature: PeerSignature,
    size: u32,
    expiration: Timestamp,
}

/// Signed PONG material for one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PongSignature {
    /// The signature.
    pub signature: PeerSignature,
    /// Purpose header size field.
    pub size: u32,
    /// Expiration covered by the signature.
    pub expiration: Timestamp,
}

/// PONG signatures keyed by purpose and confirmed address.
///
/// A cached signature is reused until less than a quarter of its lifetime
/// remains; reusing it keeps the signed body (and thus the signature)
/// byte-identical.
#[derive(Debug, Default)]
pub struct SignatureCache {
    entries: HashMap<(SignaturePurpose, String, Vec<u8>), CachedSignature>,
}

impl SignatureCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature for `(transport, raw)` under `purpose`, signing afresh when
    /// the cached one is missing or close to expiry.
    pub fn get_or_sign(
        &mut self,
        keypair: &PeerKeyPair,
        purpose: SignaturePurpose,
        transport: &str,
        raw: &[u8],
        now: Timestamp,
        lifetime: Duration,
    ) -> PongSignature {
        let key = (purpose, transport.to_string(), raw.to_vec());
        if let Some(cached) = self.entries.get(&key) {
            if cached.expiration.remaining(now) >= lifetime / 4 {
                return PongSignature {
                    signature: cached.signature,
                    size: cached.size,
                    expiration: cached.expiration,
                };
            }
        }
        let expiration = now.saturating_add(lifetime);
        let body = PongMessage::build_signed_body(expiration, transport, raw);
        let (signature, size) = keypair.sign_purpose(purpose, &body);
        self.entries.insert(
            key,
            CachedSignature {
                signature,
                size,
                expiration,
            },
        );
        PongSignature {
            signature,
            size,
            expiration,
        }
    }

    /// Drop signatures that have expired.
    pub fn prune(&mut self, now: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, c| c.expiration > now);
        before - self.entries.len()
    }

    /// Number of cached signatures.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
