//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the session multiplexer and the port interfaces
//! it uses to reach the message bus and the client stream.

/// Port interfaces for the message bus, outbound sink, and mapper.
pub mod ports;

/// Session and session registry services.
pub mod services;
