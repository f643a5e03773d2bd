//! Port Interfaces
//!
//! Defines the interfaces (ports) the session multiplexer depends on,
//! following the Hexagonal Architecture pattern. Infrastructure adapters
//! implement these contracts.
//!
//! ## Driven Ports (Outbound)
//!
//! - `MessageBus`: topic subscriptions with acknowledged delivery
//! - `EventSink`: the single outbound stream of one client
//! - `EnvelopeMapper`: turns bus payloads into outbound messages

mod envelope_mapper_port;
mod event_sink_port;
mod message_bus_port;

pub use envelope_mapper_port::{EnvelopeMapper, MapError};
pub use event_sink_port::{EventSink, SinkError};
#[cfg(test)]
pub use message_bus_port::MockMessageBus;
pub use message_bus_port::{BusError, MessageBus};
