#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Duel Event Stream - Session Multiplexer
//!
//! A gRPC service that holds one long-lived server-streaming call per client
//! and multiplexes duel lifecycle events from the message bus into it.
//! Clients receive every new duel on the baseline topic and add or remove
//! per-duel topics on demand.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core session types with no runtime dependencies
//!   - `identity`: Telegram user ids
//!   - `topic`: Broadcast and per-duel topic names
//!   - `envelope`: Bus deliveries with ack/nack settlement
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for the message bus, outbound sink, and mapper
//!   - `services`: `Session` and `SessionRegistry`
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `bus`: In-memory message bus
//!   - `grpc`: gRPC streaming server, interceptors, and status mapping
//!   - `config`: Configuration from environment
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!                  ┌──────────────┐     ┌─────────────┐
//! duel.created ───►│              │────►│  Session A  │──► Client A
//!                  │  Message Bus │     └─────────────┘
//! duel:<id>    ───►│              │     ┌─────────────┐
//!                  │              │────►│  Session B  │──► Client B
//!                  └──────────────┘     └─────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Identity, topic, and envelope types.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::envelope::{Acknowledger, Envelope, Settlement};
pub use domain::identity::{AuthError, UserId};
pub use domain::topic::{BASELINE_TOPIC, BroadcastTopic, Topic, TopicError};

// Application services
pub use application::ports::{
    BusError, EnvelopeMapper, EventSink, MapError, MessageBus, SinkError,
};
pub use application::services::{Session, SessionError, SessionRegistry};

// Infrastructure config
pub use infrastructure::config::{
    BusSettings, ConfigError, Environment, ServerSettings, SessionSettings, StreamConfig,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Message bus (for integration tests)
pub use infrastructure::bus::{BusStats, MemoryBus, MemoryBusConfig};

// gRPC server (for integration tests)
pub use infrastructure::grpc::{
    DuelEventMapper, EventStreamServer, EventStreamServerConfig, GrpcSink, intercept,
    panic_response, proto::giftduels as proto, server::StreamRegistry,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
