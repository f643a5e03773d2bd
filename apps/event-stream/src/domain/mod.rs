//! Domain Layer - Core session types and business rules.
//!
//! This layer holds the identity, topic, and envelope types the session
//! multiplexer is built on. Nothing here touches gRPC or the runtime.

/// Client identity resolved from request metadata.
pub mod identity;

/// Topic naming for broadcast and per-duel subscriptions.
pub mod topic;

/// Bus envelopes and their acknowledgement handles.
pub mod envelope;
