//! # Ed25519 Signatures
//!
//! Peer identity keys. A peer id is the 32-byte verifying key.
//!
//! ## Security Properties
//!
//! - Deterministic nonces: signing the same bytes twice yields the same
//!   signature, which the PONG signature cache relies on
//! - Secret seed is zeroized on drop

use crate::purpose::{check_header, purpose_bytes, SignaturePurpose};
use crate::CryptoError;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use shared_types::PeerId;
use zeroize::Zeroize;

/// Ed25519 public key (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerPublicKey([u8; 32]);

impl PeerPublicKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        // Validate it's a valid point
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Key of a peer.
    pub fn from_peer(peer: &PeerId) -> Result<Self, CryptoError> {
        Self::from_bytes(*peer.as_bytes())
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Peer identified by this key.
    pub fn peer_id(&self) -> PeerId {
        PeerId::new(self.0)
    }

    /// Verify a signature over raw bytes.
    pub fn verify(&self, message: &[u8], signature: &PeerSignature) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }

    /// Verify a purpose-tagged signature as received on the wire.
    pub fn verify_purpose(
        &self,
        expected: SignaturePurpose,
        size: u32,
        code: u32,
        body: &[u8],
        signature: &PeerSignature,
    ) -> Result<(), CryptoError> {
        check_header(expected, size, code, body)?;
        self.verify(&purpose_bytes(expected, body), signature)
    }
}

/// Ed25519 signature (64 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerSignature([u8; 64]);

impl PeerSignature {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

/// Ed25519 keypair of the local peer.
pub struct PeerKeyPair {
    signing_key: SigningKey,
}

impl PeerKeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret seed (32 bytes).
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        Self { signing_key }
    }

    /// Create from a 64-character hex seed.
    pub fn from_hex_seed(hex_seed: &str) -> Result<Self, CryptoError> {
        let mut bytes =
            hex::decode(hex_seed.trim()).map_err(|e| CryptoError::InvalidSeed(e.to_string()))?;
        let seed: Result<[u8; 32], _> = bytes.as_slice().try_into();
        bytes.zeroize();
        let mut seed =
            seed.map_err(|_| CryptoError::InvalidSeed("seed must be 32 bytes".into()))?;
        let pair = Self::from_seed(seed);
        seed.zeroize();
        Ok(pair)
    }

    /// Get public key.
    pub fn public_key(&self) -> PeerPublicKey {
        let verifying_key = self.signing_key.verifying_key();
        PeerPublicKey(verifying_key.to_bytes())
    }

    /// Our peer id.
    pub fn peer_id(&self) -> PeerId {
        self.public_key().peer_id()
    }

    /// Sign raw bytes (deterministic - no RNG needed).
    pub fn sign(&self, message: &[u8]) -> PeerSignature {
        let sig = self.signing_key.sign(message);
        PeerSignature(sig.to_bytes())
    }

    /// Sign `body` under `purpose`; returns the signature and the size field
    /// to put on the wire.
    pub fn sign_purpose(&self, purpose: SignaturePurpose, body: &[u8]) -> (PeerSignature, u32) {
        (
            self.sign(&purpose_bytes(purpose, body)),
            SignaturePurpose::signed_size(body),
        )
    }

    /// Get secret seed (for serialization).
    pub fn to_seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl std::fmt::Debug for PeerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PeerKeyPair({})", self.peer_id())
    }
}

impl Drop for PeerKeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}
