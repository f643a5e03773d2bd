//! Message Bus Port (Driven Port)
//!
//! Topic-based publish/subscribe with per-delivery acknowledgement.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::envelope::Envelope;

/// Message bus errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The bus has been shut down.
    #[error("message bus is closed")]
    Closed,

    /// Topic name was empty or malformed.
    #[error("invalid topic name: {0:?}")]
    InvalidTopic(String),

    /// The bus refused the subscription.
    #[error("subscription to {topic} rejected: {message}")]
    Rejected {
        /// Topic that was requested.
        topic: String,
        /// Reason given by the bus.
        message: String,
    },
}

/// Port for the pub/sub transport sessions read from.
///
/// Implementations must settle every envelope they hand out exactly once,
/// which `Envelope` guarantees as long as the implementation does not leak it.
#[cfg_attr(test, mockall::automock)]
pub trait MessageBus: Send + Sync {
    /// Subscribe to `topic` until `cancel` fires.
    ///
    /// The returned receiver yields envelopes in publish order and closes
    /// once the subscription ends.
    ///
    /// # Errors
    ///
    /// Returns `BusError` if the subscription could not be established.
    fn subscribe(
        &self,
        cancel: CancellationToken,
        topic: &str,
    ) -> Result<mpsc::Receiver<Envelope>, BusError>;

    /// Publish a payload to every current subscriber of `topic`.
    ///
    /// Returns the number of subscribers the message was handed to.
    ///
    /// # Errors
    ///
    /// Returns `BusError` if the bus is closed or the topic is invalid.
    fn publish(&self, topic: &str, payload: Bytes) -> Result<usize, BusError>;
}
