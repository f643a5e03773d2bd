//! Event Sink Port (Driven Port)
//!
//! The outbound half of one client's streaming call.

use async_trait::async_trait;

/// Outbound send errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The client went away.
    #[error("client stream disconnected")]
    Disconnected,
}

/// A single logical writer towards one client.
///
/// Callers serialize writes themselves; implementations need not be safe
/// against interleaved sends from several tasks.
#[async_trait]
pub trait EventSink<M: Send + 'static>: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Disconnected` if the peer is gone.
    async fn send(&self, message: M) -> Result<(), SinkError>;

    /// Resolves once the peer has gone away.
    async fn closed(&self);
}
