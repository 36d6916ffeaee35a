//! # Wire Codec
//!
//! Messages exchanged with remote peers. Every message starts with a
//! 4-byte header (`size: u16`, `type: u16`, network byte order) where `size`
//! includes the header itself. Several messages may be concatenated in one
//! plugin send.
//!
//! Transport addresses travel as the transport name, a zero byte, then the
//! plugin-specific bytes.

use crate::entities::{PeerId, Timestamp};
use crate::errors::WireError;

/// Size of the common message header.
pub const HEADER_SIZE: usize = 4;

/// Length of an Ed25519 signature on the wire.
pub const SIGNATURE_SIZE: usize = 64;

/// Message type codes.
pub mod message_type {
    /// Address advertisement.
    pub const HELLO: u16 = 17;
    /// Address validation probe.
    pub const PING: u16 = 372;
    /// Signed answer to a PING.
    pub const PONG: u16 = 373;
    /// Handshake start.
    pub const SYN: u16 = 375;
    /// Handshake answer.
    pub const SYN_ACK: u16 = 376;
    /// Handshake completion.
    pub const ACK: u16 = 377;
    /// Signed teardown notice.
    pub const DISCONNECT: u16 = 378;
    /// Liveness probe.
    pub const KEEPALIVE: u16 = 379;
    /// Liveness probe answer.
    pub const KEEPALIVE_RESPONSE: u16 = 380;
    /// Inbound quota announcement.
    pub const QUOTA: u16 = 381;
}

// =============================================================================
// MESSAGE BODIES
// =============================================================================

/// SYN and SYN_ACK share this body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynMessage {
    /// Reserved, always zero on send.
    pub reserved: u32,
    /// Time the SYN was created; echoed back in the SYN_ACK.
    pub timestamp: Timestamp,
}

impl SynMessage {
    /// Body for a SYN/SYN_ACK carrying `timestamp`.
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            reserved: 0,
            timestamp,
        }
    }
}

/// Address validation probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingMessage {
    /// Random value echoed in the PONG.
    pub challenge: u32,
    /// Peer that is supposed to answer.
    pub target: PeerId,
    /// Address (transport, bytes) to confirm; `None` just confirms the
    /// session the PING arrived on.
    pub address: Option<(String, Vec<u8>)>,
}

/// Signed answer to a PING.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PongMessage {
    /// Challenge copied from the PING.
    pub challenge: u32,
    /// Signature over the purpose header and the signed body.
    pub signature: [u8; SIGNATURE_SIZE],
    /// Size field of the signed purpose header.
    pub purpose_size: u32,
    /// Purpose code of the signature.
    pub purpose: u32,
    /// Signature validity.
    pub expiration: Timestamp,
    /// Confirmed transport name (empty for a session-only PONG).
    pub transport: String,
    /// Confirmed address bytes.
    pub raw: Vec<u8>,
}

impl PongMessage {
    /// Length of the encoded (transport, address) pair.
    pub fn addr_len(&self) -> u32 {
        encoded_addr_len(&self.transport, &self.raw) as u32
    }

    /// Bytes covered by the signature after the purpose header.
    pub fn signed_body(&self) -> Vec<u8> {
        Self::build_signed_body(self.expiration, &self.transport, &self.raw)
    }

    /// Signed body for given fields; the responder signs this when building
    /// a PONG and the prober rebuilds it to verify.
    pub fn build_signed_body(expiration: Timestamp, transport: &str, raw: &[u8]) -> Vec<u8> {
        let addr = encode_addr(transport, raw);
        let mut out = Vec::with_capacity(12 + addr.len());
        out.extend_from_slice(&expiration.as_millis().to_be_bytes());
        out.extend_from_slice(&(addr.len() as u32).to_be_bytes());
        out.extend_from_slice(&addr);
        out
    }
}

/// Signed teardown notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectMessage {
    /// Reserved, always zero on send.
    pub reserved: u32,
    /// Size field of the signed purpose header.
    pub purpose_size: u32,
    /// Purpose code of the signature.
    pub purpose: u32,
    /// Creation time; older than the peer's last SYN means stale.
    pub timestamp: Timestamp,
    /// Sender's public key; must equal the sender's peer id.
    pub public_key: [u8; 32],
    /// Signature over purpose header and timestamp.
    pub signature: [u8; SIGNATURE_SIZE],
}

impl DisconnectMessage {
    /// Bytes covered by the signature after the purpose header.
    pub fn signed_body(&self) -> Vec<u8> {
        Self::build_signed_body(self.timestamp)
    }

    /// Signed body for a timestamp.
    pub fn build_signed_body(timestamp: Timestamp) -> Vec<u8> {
        timestamp.as_millis().to_be_bytes().to_vec()
    }
}

/// One advertised address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloEntry {
    /// Transport name.
    pub transport: String,
    /// Plugin-specific bytes.
    pub raw: Vec<u8>,
    /// Advertisement validity.
    pub expiration: Timestamp,
}

/// Address advertisement of a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloMessage {
    /// Advertising peer.
    pub peer: PeerId,
    /// Its addresses.
    pub entries: Vec<HelloEntry>,
}

// =============================================================================
// MESSAGE ENUM
// =============================================================================

/// Any message of the transport protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// Address advertisement.
    Hello(HelloMessage),
    /// Validation probe.
    Ping(PingMessage),
    /// Validation answer.
    Pong(PongMessage),
    /// Handshake start.
    Syn(SynMessage),
    /// Handshake answer.
    SynAck(SynMessage),
    /// Handshake completion (empty body).
    Ack,
    /// Signed teardown.
    Disconnect(DisconnectMessage),
    /// Liveness probe.
    Keepalive { nonce: u32 },
    /// Liveness answer.
    KeepaliveResponse { nonce: u32 },
    /// Our inbound quota, bytes/s.
    Quota { bytes_per_sec: u32 },
    /// Anything else: application payload passed through to clients.
    Payload { msg_type: u16, body: Vec<u8> },
}

impl WireMessage {
    /// Message type code.
    pub fn msg_type(&self) -> u16 {
        use message_type::*;
        match self {
            Self::Hello(_) => HELLO,
            Self::Ping(_) => PING,
            Self::Pong(_) => PONG,
            Self::Syn(_) => SYN,
            Self::SynAck(_) => SYN_ACK,
            Self::Ack => ACK,
            Self::Disconnect(_) => DISCONNECT,
            Self::Keepalive { .. } => KEEPALIVE,
            Self::KeepaliveResponse { .. } => KEEPALIVE_RESPONSE,
            Self::Quota { .. } => QUOTA,
            Self::Payload { msg_type, .. } => *msg_type,
        }
    }

    /// Encode header and body.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut body = Vec::new();
        match self {
            Self::Hello(hello) => {
                body.extend_from_slice(hello.peer.as_bytes());
                for entry in &hello.entries {
                    body.extend_from_slice(entry.transport.as_bytes());
                    body.push(0);
                    let len = u16::try_from(entry.raw.len())
                        .map_err(|_| WireError::TooLarge { size: entry.raw.len() })?;
                    body.extend_from_slice(&len.to_be_bytes());
                    body.extend_from_slice(&entry.expiration.as_millis().to_be_bytes());
                    body.extend_from_slice(&entry.raw);
                }
            }
            Self::Ping(ping) => {
                body.extend_from_slice(&ping.challenge.to_be_bytes());
                body.extend_from_slice(ping.target.as_bytes());
                if let Some((transport, raw)) = &ping.address {
                    body.extend_from_slice(&encode_addr(transport, raw));
                }
            }
            Self::Pong(pong) => {
                body.extend_from_slice(&pong.challenge.to_be_bytes());
                body.extend_from_slice(&pong.signature);
                body.extend_from_slice(&pong.purpose_size.to_be_bytes());
                body.extend_from_slice(&pong.purpose.to_be_bytes());
                body.extend_from_slice(&pong.signed_body());
            }
            Self::Syn(syn) | Self::SynAck(syn) => {
                body.extend_from_slice(&syn.reserved.to_be_bytes());
                body.extend_from_slice(&syn.timestamp.as_millis().to_be_bytes());
            }
            Self::Ack => {}
            Self::Disconnect(d) => {
                body.extend_from_slice(&d.reserved.to_be_bytes());
                body.extend_from_slice(&d.purpose_size.to_be_bytes());
                body.extend_from_slice(&d.purpose.to_be_bytes());
                body.extend_from_slice(&d.timestamp.as_millis().to_be_bytes());
                body.extend_from_slice(&d.public_key);
                body.extend_from_slice(&d.signature);
            }
            Self::Keepalive { nonce } | Self::KeepaliveResponse { nonce } => {
                body.extend_from_slice(&nonce.to_be_bytes());
            }
            Self::Quota { bytes_per_sec } => {
                body.extend_from_slice(&bytes_per_sec.to_be_bytes());
            }
            Self::Payload { body: payload, .. } => body.extend_from_slice(payload),
        }

        let size = HEADER_SIZE + body.len();
        let size16 = u16::try_from(size).map_err(|_| WireError::TooLarge { size })?;
        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(&size16.to_be_bytes());
        out.extend_from_slice(&self.msg_type().to_be_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decode one message from the front of `buf`; returns it with the
    /// number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(WireMessage, usize), WireError> {
        let mut header = Reader::new(buf);
        let size = header.u16()? as usize;
        let msg_type = header.u16()?;
        if size < HEADER_SIZE {
            return Err(WireError::BadSize { msg_type, size });
        }
        if buf.len() < size {
            return Err(WireError::Truncated {
                needed: size,
                available: buf.len(),
            });
        }
        let body = &buf[HEADER_SIZE..size];
        let message = Self::decode_body(msg_type, body).map_err(|e| match e {
            WireError::Truncated { .. } => WireError::BadSize { msg_type, size },
            other => other,
        })?;
        Ok((message, size))
    }

    /// Decode every message in `buf`.
    pub fn decode_all(mut buf: &[u8]) -> Result<Vec<WireMessage>, WireError> {
        let mut out = Vec::new();
        while !buf.is_empty() {
            let (message, used) = Self::decode(buf)?;
            out.push(message);
            buf = &buf[used..];
        }
        Ok(out)
    }

    fn decode_body(msg_type: u16, body: &[u8]) -> Result<WireMessage, WireError> {
        use message_type::*;
        let mut r = Reader::new(body);
        let message = match msg_type {
            HELLO => {
                let peer = PeerId::new(r.array::<32>()?);
                let mut entries = Vec::new();
                while !r.is_empty() {
                    let transport = r.cstring()?;
                    let len = r.u16()? as usize;
                    let expiration = Timestamp::from_millis(r.u64()?);
                    let raw = r.bytes(len)?.to_vec();
                    entries.push(HelloEntry {
                        transport,
                        raw,
                        expiration,
                    });
                }
                WireMessage::Hello(HelloMessage { peer, entries })
            }
            PING => {
                let challenge = r.u32()?;
                let target = PeerId::new(r.array::<32>()?);
                let rest = r.rest();
                let address = if rest.is_empty() {
                    None
                } else {
                    Some(decode_addr(rest)?)
                };
                WireMessage::Ping(PingMessage {
                    challenge,
                    target,
                    address,
                })
            }
            PONG => {
                let challenge = r.u32()?;
                let signature = r.array::<SIGNATURE_SIZE>()?;
                let purpose_size = r.u32()?;
                let purpose = r.u32()?;
                let expiration = Timestamp::from_millis(r.u64()?);
                let addr_len = r.u32()? as usize;
                let addr = r.rest();
                if addr.len() != addr_len {
                    return Err(WireError::BadSize {
                        msg_type,
                        size: HEADER_SIZE + body.len(),
                    });
                }
                let (transport, raw) = if addr.is_empty() {
                    (String::new(), Vec::new())
                } else {
                    decode_addr(addr)?
                };
                WireMessage::Pong(PongMessage {
                    challenge,
                    signature,
                    purpose_size,
                    purpose,
                    expiration,
                    transport,
                    raw,
                })
            }
            SYN | SYN_ACK => {
                let syn = SynMessage {
                    reserved: r.u32()?,
                    timestamp: Timestamp::from_millis(r.u64()?),
                };
                r.expect_end(msg_type)?;
                if msg_type == SYN {
                    WireMessage::Syn(syn)
                } else {
                    WireMessage::SynAck(syn)
                }
            }
            ACK => {
                r.expect_end(msg_type)?;
                WireMessage::Ack
            }
            DISCONNECT => {
                let message = DisconnectMessage {
                    reserved: r.u32()?,
                    purpose_size: r.u32()?,
                    purpose: r.u32()?,
                    timestamp: Timestamp::from_millis(r.u64()?),
                    public_key: r.array::<32>()?,
                    signature: r.array::<SIGNATURE_SIZE>()?,
                };
                r.expect_end(msg_type)?;
                WireMessage::Disconnect(message)
            }
            KEEPALIVE | KEEPALIVE_RESPONSE => {
                let nonce = r.u32()?;
                r.expect_end(msg_type)?;
                if msg_type == KEEPALIVE {
                    WireMessage::Keepalive { nonce }
                } else {
                    WireMessage::KeepaliveResponse { nonce }
                }
            }
            QUOTA => {
                let bytes_per_sec = r.u32()?;
                r.expect_end(msg_type)?;
                WireMessage::Quota { bytes_per_sec }
            }
            other => WireMessage::Payload {
                msg_type: other,
                body: body.to_vec(),
            },
        };
        Ok(message)
    }
}

// =============================================================================
// ADDRESS ENCODING
// =============================================================================

fn encoded_addr_len(transport: &str, raw: &[u8]) -> usize {
    if transport.is_empty() && raw.is_empty() {
        0
    } else {
        transport.len() + 1 + raw.len()
    }
}

/// `transport \0 raw`; empty for an empty pair.
pub fn encode_addr(transport: &str, raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_addr_len(transport, raw));
    if transport.is_empty() && raw.is_empty() {
        return out;
    }
    out.extend_from_slice(transport.as_bytes());
    out.push(0);
    out.extend_from_slice(raw);
    out
}

/// Inverse of [`encode_addr`] for a non-empty buffer.
pub fn decode_addr(buf: &[u8]) -> Result<(String, Vec<u8>), WireError> {
    let zero = buf
        .iter()
        .position(|b| *b == 0)
        .ok_or(WireError::MalformedAddress)?;
    let transport =
        std::str::from_utf8(&buf[..zero]).map_err(|_| WireError::MalformedAddress)?;
    if transport.is_empty() {
        return Err(WireError::MalformedAddress);
    }
    Ok((transport.to_string(), buf[zero + 1..].to_vec()))
}

// =============================================================================
// READER
// =============================================================================

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(n).ok_or(WireError::Truncated {
            needed: usize::MAX,
            available: self.buf.len(),
        })?;
        if end > self.buf.len() {
            return Err(WireError::Truncated {
                needed: end,
                available: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_be_bytes(self.array::<2>()?))
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_be_bytes(self.array::<4>()?))
    }

    fn u64(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_be_bytes(self.array::<8>()?))
    }

    fn cstring(&mut self) -> Result<String, WireError> {
        let rest = &self.buf[self.pos.min(self.buf.len())..];
        let zero = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(WireError::MalformedAddress)?;
        let s = std::str::from_utf8(&rest[..zero]).map_err(|_| WireError::MalformedAddress)?;
        self.pos += zero + 1;
        Ok(s.to_string())
    }

    fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos.min(self.buf.len())..];
        self.pos = self.buf.len();
        out
    }

    fn expect_end(&self, msg_type: u16) -> Result<(), WireError> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(WireError::BadSize {
                msg_type,
                size: HEADER_SIZE + self.buf.len(),
            })
        }
    }
}
