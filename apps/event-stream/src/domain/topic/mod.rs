//! Topic Naming
//!
//! The bus carries two kinds of topics:
//!
//! - **Broadcast** topics (`duel.created`, `duel.joined`, ...) that every
//!   connected client receives through its baseline subscription.
//! - **Scoped** topics (`duel:<id>`) that carry the full event history of a
//!   single duel and are added or removed per client on demand.

use std::fmt;

// =============================================================================
// Topic Catalogue
// =============================================================================

/// Broadcast topic for newly created duels.
pub const DUEL_CREATED: &str = "duel.created";

/// Broadcast topic for participants joining a duel.
pub const DUEL_JOINED: &str = "duel.joined";

/// Broadcast topic for cancelled duels.
pub const DUEL_CANCELLED: &str = "duel.cancelled";

/// Broadcast topic for completed duels.
pub const DUEL_COMPLETED: &str = "duel.completed";

/// Scope prefix for per-duel topics.
pub const DUEL_SCOPE: &str = "duel";

/// Topic every session subscribes to when its stream opens.
pub const BASELINE_TOPIC: &str = DUEL_CREATED;

/// Lifecycle broadcast topics published by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BroadcastTopic {
    /// `duel.created`
    Created,
    /// `duel.joined`
    Joined,
    /// `duel.cancelled`
    Cancelled,
    /// `duel.completed`
    Completed,
}

impl BroadcastTopic {
    /// Every broadcast topic.
    pub const ALL: [Self; 4] = [Self::Created, Self::Joined, Self::Cancelled, Self::Completed];

    /// Get the topic name on the bus.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => DUEL_CREATED,
            Self::Joined => DUEL_JOINED,
            Self::Cancelled => DUEL_CANCELLED,
            Self::Completed => DUEL_COMPLETED,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

// =============================================================================
// Topic
// =============================================================================

/// A parsed bus topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A lifecycle broadcast topic.
    Broadcast(BroadcastTopic),
    /// A topic scoped to one duel.
    Duel(String),
}

impl Topic {
    /// Build the scoped topic for a duel id. The id is used verbatim.
    ///
    /// # Errors
    ///
    /// Returns `TopicError::EmptyDuelId` if the id is blank and
    /// `TopicError::InvalidDuelId` if it contains a `:` separator.
    pub fn duel(id: &str) -> Result<Self, TopicError> {
        if id.trim().is_empty() {
            return Err(TopicError::EmptyDuelId);
        }
        if id.contains(':') {
            return Err(TopicError::InvalidDuelId(id.to_string()));
        }
        Ok(Self::Duel(id.to_string()))
    }

    /// Parse a topic name as seen on the bus.
    ///
    /// Returns `None` for unknown broadcast names, unknown scopes, a missing
    /// `:` separator or an empty scoped id.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(topic) = BroadcastTopic::from_name(name) {
            return Some(Self::Broadcast(topic));
        }
        let (scope, id) = name.split_once(':')?;
        if scope != DUEL_SCOPE || id.is_empty() {
            return None;
        }
        Some(Self::Duel(id.to_string()))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broadcast(topic) => f.write_str(topic.as_str()),
            Self::Duel(id) => write!(f, "{DUEL_SCOPE}:{id}"),
        }
    }
}

/// Topic construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    /// Duel id was empty or whitespace.
    #[error("duel id cannot be empty")]
    EmptyDuelId,

    /// Duel id contains characters reserved by the topic format.
    #[error("invalid duel id: {0:?}")]
    InvalidDuelId(String),
}
