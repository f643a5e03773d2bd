//! Bus Envelopes
//!
//! An `Envelope` is one delivery of a bus message to one subscriber. It must be
//! settled exactly once: `ack` and `nack` consume the envelope, and an envelope
//! dropped without being settled is nacked.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

/// Outcome reported back to the bus for a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Delivery handled.
    Ack,
    /// Delivery rejected or abandoned.
    Nack,
}

/// Receives settlement outcomes for envelopes issued by a bus.
pub trait Acknowledger: Send + Sync {
    /// Record the settlement of one delivery.
    fn settle(&self, id: Uuid, topic: &str, settlement: Settlement);
}

/// One message delivered from a bus topic.
pub struct Envelope {
    id: Uuid,
    topic: String,
    payload: Bytes,
    acker: Option<Arc<dyn Acknowledger>>,
}

impl Envelope {
    /// Create an envelope that reports its settlement to `acker`.
    #[must_use]
    pub fn new(
        id: Uuid,
        topic: impl Into<String>,
        payload: Bytes,
        acker: Arc<dyn Acknowledger>,
    ) -> Self {
        Self {
            id,
            topic: topic.into(),
            payload,
            acker: Some(acker),
        }
    }

    /// Message id assigned at publish time.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Topic the message was delivered on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Raw message payload.
    #[must_use]
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Acknowledge the delivery.
    pub fn ack(mut self) {
        self.settle(Settlement::Ack);
    }

    /// Reject the delivery.
    pub fn nack(mut self) {
        self.settle(Settlement::Nack);
    }

    fn settle(&mut self, settlement: Settlement) {
        if let Some(acker) = self.acker.take() {
            acker.settle(self.id, &self.topic, settlement);
        }
    }
}

impl Drop for Envelope {
    fn drop(&mut self) {
        self.settle(Settlement::Nack);
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("payload_len", &self.payload.len())
            .field("settled", &self.acker.is_none())
            .finish()
    }
}
