//! Outbound payload queue.

use shared_types::{SendToken, Timestamp};
use std::collections::VecDeque;

/// A client payload waiting for the primary session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// Encoded message, header included.
    pub payload: Vec<u8>,
    /// Fail the message if it is still queued at this time.
    pub timeout_at: Timestamp,
    /// Client receipt reported in `SendComplete`.
    pub receipt: u64,
}

/// The message currently handed to the plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    /// Token the plugin reports completion with.
    pub token: SendToken,
    /// Client receipt.
    pub receipt: u64,
    /// Payload size in bytes.
    pub bytes: usize,
}

/// FIFO of client payloads; at most one message is in flight.
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: VecDeque<QueuedMessage>,
    in_flight: Option<InFlight>,
}

impl MessageQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub fn push(&mut self, message: QueuedMessage) {
        self.messages.push_back(message);
    }

    /// Take the next message if none is in flight.
    pub fn next_ready(&mut self) -> Option<QueuedMessage> {
        if self.in_flight.is_some() {
            return None;
        }
        self.messages.pop_front()
    }

    /// Remove every queued message whose timeout passed.
    pub fn take_expired(&mut self, now: Timestamp) -> Vec<QueuedMessage> {
        let (expired, keep): (VecDeque<_>, VecDeque<_>) = self
            .messages
            .drain(..)
            .partition(|m| m.timeout_at <= now);
        self.messages = keep;
        expired.into()
    }

    /// Record the message handed to the plugin.
    pub fn set_in_flight(&mut self, in_flight: InFlight) {
        self.in_flight = Some(in_flight);
    }

    /// Clear the in-flight message if `token` matches it.
    pub fn complete(&mut self, token: SendToken) -> Option<InFlight> {
        match &self.in_flight {
            Some(f) if f.token == token => self.in_flight.take(),
            _ => None,
        }
    }

    /// Drain everything, the in-flight message first.
    pub fn drain(&mut self) -> (Option<InFlight>, Vec<QueuedMessage>) {
        (self.in_flight.take(), self.messages.drain(..).collect())
    }

    /// Queued messages, not counting the one in flight.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Nothing queued.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// A message is with the plugin.
    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}
