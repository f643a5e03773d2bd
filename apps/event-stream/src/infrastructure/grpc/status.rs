//! gRPC Status Mapping
//!
//! Converts domain and session errors into `tonic::Status` with rich error
//! details attached.

use std::collections::HashMap;

use tonic::{Code, Status};
use tonic_types::{ErrorDetails, StatusExt};

use crate::application::services::SessionError;
use crate::domain::identity::AuthError;
use crate::domain::topic::TopicError;

/// Error domain reported in `ErrorInfo` details.
pub const ERROR_DOMAIN: &str = "giftduels.event";

/// Request handling errors raised by the RPC handlers themselves.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// The caller has no live `Stream` call.
    #[error("stream session not established, call Stream first")]
    SessionNotEstablished,

    /// A duel id could not be turned into a topic.
    #[error(transparent)]
    InvalidDuelId(#[from] TopicError),
}

impl HandlerError {
    const fn reason(&self) -> &'static str {
        match self {
            Self::SessionNotEstablished => "SESSION_NOT_ESTABLISHED",
            Self::InvalidDuelId(_) => "INVALID_DUEL_IDS",
        }
    }
}

fn error_details(reason: &str) -> ErrorDetails {
    let mut details = ErrorDetails::new();
    details.set_error_info(reason, ERROR_DOMAIN, HashMap::<String, String>::new());
    details
}

impl From<HandlerError> for Status {
    fn from(err: HandlerError) -> Self {
        let message = err.to_string();
        let mut details = error_details(err.reason());
        let code = match err {
            HandlerError::SessionNotEstablished => {
                details.add_precondition_failure_violation("STREAM", "session", &message);
                Code::FailedPrecondition
            }
            HandlerError::InvalidDuelId(_) => {
                details.add_bad_request_violation("duel_ids", &message);
                Code::InvalidArgument
            }
        };
        Self::with_error_details(code, message, details)
    }
}

impl From<AuthError> for Status {
    fn from(err: AuthError) -> Self {
        Self::with_error_details(
            Code::Unauthenticated,
            err.to_string(),
            error_details("UNAUTHENTICATED"),
        )
    }
}

impl From<SessionError> for Status {
    fn from(err: SessionError) -> Self {
        let (code, reason) = match &err {
            SessionError::Subscription(_) => (Code::Internal, "SUBSCRIPTION_FAILED"),
            SessionError::Send(_) => (Code::Unavailable, "DELIVERY_FAILED"),
            SessionError::Closed | SessionError::AlreadyStarted => {
                (Code::FailedPrecondition, "SESSION_CLOSED")
            }
        };
        Self::with_error_details(code, err.to_string(), error_details(reason))
    }
}
