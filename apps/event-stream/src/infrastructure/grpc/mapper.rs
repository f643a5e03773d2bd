//! Duel Event Mapper
//!
//! Decodes bus payloads into `StreamResponse` messages.
//!
//! | Topic          | Payload              |
//! |----------------|----------------------|
//! | `duel.created` | `DuelCreatedEvent`   |
//! | `duel:<id>`    | `DuelEvent`          |
//!
//! Other broadcast topics carry nothing a client subscribes to directly and
//! are rejected as unrecognized.

use prost::Message;

use super::proto::giftduels::duel::v1::{DuelCreatedEvent, DuelEvent, duel_event};
use super::proto::giftduels::event::v1::{StreamResponse, stream_response};
use crate::application::ports::{EnvelopeMapper, MapError};
use crate::domain::topic::{BroadcastTopic, Topic};

/// Maps bus deliveries to client stream messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuelEventMapper;

impl DuelEventMapper {
    /// Create a new mapper.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EnvelopeMapper for DuelEventMapper {
    type Output = StreamResponse;

    fn map(&self, topic: &str, payload: &[u8]) -> Result<Option<StreamResponse>, MapError> {
        let decode_error = |e: prost::DecodeError| MapError::Decode {
            topic: topic.to_string(),
            message: e.to_string(),
        };

        let event = match Topic::parse(topic) {
            Some(Topic::Broadcast(BroadcastTopic::Created)) => {
                let created = DuelCreatedEvent::decode(payload).map_err(decode_error)?;
                DuelEvent {
                    event: Some(duel_event::Event::DuelCreatedEvent(created)),
                }
            }
            Some(Topic::Duel(_)) => DuelEvent::decode(payload).map_err(decode_error)?,
            Some(Topic::Broadcast(_)) | None => {
                return Err(MapError::UnrecognizedTopic(topic.to_string()));
            }
        };

        Ok(Some(StreamResponse {
            payload: Some(stream_response::Payload::DuelEvent(event)),
        }))
    }
}
