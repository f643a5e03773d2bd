//! Client Identity
//!
//! Every streaming session is keyed by the Telegram user id of the client.
//! The id is authenticated upstream and forwarded to this service as request
//! metadata; this module only parses and carries it.

use std::fmt;
use std::str::FromStr;

// =============================================================================
// User Identity
// =============================================================================

/// Telegram user id of a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(i64);

impl UserId {
    /// Wrap a raw Telegram user id.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AuthError::MissingIdentity);
        }
        trimmed
            .parse::<i64>()
            .map(Self)
            .map_err(|_| AuthError::InvalidIdentity(trimmed.to_string()))
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Identity resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No identity was attached to the request.
    #[error("missing user identity")]
    MissingIdentity,

    /// The identity header was present but not a valid user id.
    #[error("invalid user identity: {0:?}")]
    InvalidIdentity(String),
}
