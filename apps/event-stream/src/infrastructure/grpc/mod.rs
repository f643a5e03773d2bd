//! gRPC Event Stream Server
//!
//! Implements the `EventPublicService` gRPC service that exposes duel events
//! to connected clients.
//!
//! # Architecture
//!
//! Each `Stream` call owns one `Session`:
//!
//! 1. The interceptor resolves the caller's identity from request metadata
//! 2. The registry installs a fresh session, evicting any previous one
//! 3. The session forwards the baseline topic plus any requested duel topics
//! 4. A driver task sends heartbeats and tears the session down on exit
//!
//! `SubscribeDuels` and `UnsubscribeDuels` look up the caller's live session
//! and change its topic set.

pub mod interceptors;
pub mod mapper;
pub mod server;
pub mod sink;
pub mod status;

// Allow clippy warnings and missing docs in generated code
#[allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
pub mod proto {
    pub mod giftduels {
        pub mod shared {
            pub mod v1 {
                include!("../../../../../packages/schema-gen/rust/giftduels/shared/v1/giftduels.shared.v1.rs");
            }
        }
        pub mod duel {
            pub mod v1 {
                include!("../../../../../packages/schema-gen/rust/giftduels/duel/v1/giftduels.duel.v1.rs");
            }
        }
        pub mod event {
            pub mod v1 {
                include!("../../../../../packages/schema-gen/rust/giftduels/event/v1/giftduels.event.v1.rs");
                include!("../../../../../packages/schema-gen/rust/giftduels/event/v1/giftduels.event.v1.tonic.rs");
            }
        }
    }
}

pub use interceptors::{RequestId, TraceId, intercept, panic_response};
pub use mapper::DuelEventMapper;
pub use server::{EventStreamServer, EventStreamServerConfig};
pub use sink::GrpcSink;
pub use status::HandlerError;
