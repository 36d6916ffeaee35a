//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Purpose header does not describe the signed bytes
    #[error("Invalid signature purpose: size {size}, code {code}")]
    InvalidPurpose {
        /// Declared size of the signed block
        size: u32,
        /// Declared purpose code
        code: u32,
    },

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid key seed
    #[error("Invalid key seed: {0}")]
    InvalidSeed(String),
}
