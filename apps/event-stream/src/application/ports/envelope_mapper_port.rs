//! Envelope Mapper Port
//!
//! Pure translation from a bus delivery to an outbound message.

/// Mapping errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// Payload could not be decoded for its topic.
    #[error("failed to decode payload on {topic}: {message}")]
    Decode {
        /// Topic the payload arrived on.
        topic: String,
        /// Decoder message.
        message: String,
    },

    /// Topic is not one the mapper knows how to translate.
    #[error("unrecognized topic: {0}")]
    UnrecognizedTopic(String),
}

impl MapError {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",
            Self::UnrecognizedTopic(_) => "unrecognized_topic",
        }
    }
}

/// Translates `(topic, payload)` into an outbound message.
///
/// Must be deterministic and free of side effects. `Ok(None)` means the
/// delivery is valid but has nothing to send.
pub trait EnvelopeMapper: Send + Sync {
    /// Outbound message type.
    type Output: Send + 'static;

    /// Map one delivery.
    ///
    /// # Errors
    ///
    /// Returns `MapError` for unknown topics or undecodable payloads.
    fn map(&self, topic: &str, payload: &[u8]) -> Result<Option<Self::Output>, MapError>;
}
