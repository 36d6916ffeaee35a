//! # Signature Purposes
//!
//! Every signed payload starts with an 8-byte header: the size of the whole
//! signed block (header included) and a purpose code, both big-endian. The
//! purpose code stops a signature made for one message kind from being
//! replayed as another.

use crate::CryptoError;

/// Size of the `(size, purpose)` header.
pub const PURPOSE_HEADER_SIZE: usize = 8;

/// What a signature is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignaturePurpose {
    /// PONG confirming one of the signer's own addresses.
    PongOwn,
    /// PONG confirming the signer is reachable over the session the PING
    /// arrived on (no address named).
    PongUsing,
    /// DISCONNECT notice.
    Disconnect,
}

impl SignaturePurpose {
    /// Wire code.
    pub fn code(self) -> u32 {
        match self {
            Self::PongOwn => 1,
            Self::PongUsing => 2,
            Self::Disconnect => 3,
        }
    }

    /// Decode a wire code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::PongOwn),
            2 => Some(Self::PongUsing),
            3 => Some(Self::Disconnect),
            _ => None,
        }
    }

    /// Size field for a signed block carrying `body`.
    pub fn signed_size(body: &[u8]) -> u32 {
        (PURPOSE_HEADER_SIZE + body.len()) as u32
    }
}

/// Bytes actually signed: header followed by `body`.
pub fn purpose_bytes(purpose: SignaturePurpose, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(PURPOSE_HEADER_SIZE + body.len());
    out.extend_from_slice(&SignaturePurpose::signed_size(body).to_be_bytes());
    out.extend_from_slice(&purpose.code().to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// Check a received `(size, code)` header against the expected purpose and
/// the body it claims to cover.
pub(crate) fn check_header(
    expected: SignaturePurpose,
    size: u32,
    code: u32,
    body: &[u8],
) -> Result<(), CryptoError> {
    if code != expected.code() || size != SignaturePurpose::signed_size(body) {
        return Err(CryptoError::InvalidPurpose { size, code });
    }
    Ok(())
}
