//! Application Services
//!
//! Services that orchestrate the domain types over the ports.
//!
//! - `Session`: one client's topic subscriptions and outbound sink
//! - `SessionRegistry`: one live session per user, with eviction

mod registry;
mod session;

pub use registry::SessionRegistry;
pub use session::{Session, SessionError};
