//! Request Interceptors
//!
//! Metadata handling shared by every RPC:
//!
//! - `x-telegram-user-id` is parsed into a `UserId` request extension.
//!   Handlers decide whether identity is required.
//! - `x-request-id` and `x-trace-id` are read or generated and stored as
//!   extensions for log correlation.
//! - Responses carry the service version in `x-service-version`.
//! - A panicking handler is answered with `INTERNAL` instead of a torn
//!   connection (see `panic_response`).

use std::any::Any;

use tonic::codegen::http;
use tonic::metadata::MetadataValue;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::domain::identity::{AuthError, UserId};

/// Metadata key carrying the caller's Telegram user id.
pub const USER_ID_HEADER: &str = "x-telegram-user-id";

/// Metadata key carrying the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Metadata key carrying the distributed trace id.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Response metadata key carrying the service version.
pub const SERVICE_VERSION_HEADER: &str = "x-service-version";

/// Correlation id attached to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Trace id attached to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

/// Server interceptor resolving identity and correlation ids.
///
/// # Errors
///
/// Returns `UNAUTHENTICATED` if the user id header is present but malformed.
#[allow(clippy::result_large_err)]
pub fn intercept(mut request: Request<()>) -> Result<Request<()>, Status> {
    let request_id =
        header(&request, REQUEST_ID_HEADER).unwrap_or_else(|| Uuid::new_v4().to_string());
    let trace_id =
        header(&request, TRACE_ID_HEADER).unwrap_or_else(|| Uuid::new_v4().to_string());

    let user_id = match request.metadata().get(USER_ID_HEADER) {
        None => None,
        Some(value) => {
            let raw = value.to_str().unwrap_or_default();
            match raw.parse::<UserId>() {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::debug!(request_id = %request_id, error = %e, "Rejected request identity");
                    return Err(Status::from(e));
                }
            }
        }
    };

    let extensions = request.extensions_mut();
    extensions.insert(RequestId(request_id));
    extensions.insert(TraceId(trace_id));
    if let Some(id) = user_id {
        extensions.insert(id);
    }

    Ok(request)
}

fn header<T>(request: &Request<T>, key: &str) -> Option<String> {
    request
        .metadata()
        .get(key)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Identity resolved by the interceptor.
///
/// # Errors
///
/// Returns `AuthError::MissingIdentity` if no user id was attached.
pub fn user_id<T>(request: &Request<T>) -> Result<UserId, AuthError> {
    request
        .extensions()
        .get::<UserId>()
        .copied()
        .ok_or(AuthError::MissingIdentity)
}

/// Correlation id for logs; empty if the interceptor did not run.
#[must_use]
pub fn request_id<T>(request: &Request<T>) -> String {
    request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Trace id for logs; empty if the interceptor did not run.
#[must_use]
pub fn trace_id<T>(request: &Request<T>) -> String {
    request
        .extensions()
        .get::<TraceId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Attach the service version header to a response.
#[must_use]
pub fn with_version<T>(mut response: Response<T>, version: &str) -> Response<T> {
    if let Ok(value) = MetadataValue::try_from(version) {
        response.metadata_mut().insert(SERVICE_VERSION_HEADER, value);
    }
    response
}

/// Response for a handler that panicked, used with `CatchPanicLayer`.
#[must_use]
pub fn panic_response(
    panic: Box<dyn Any + Send + 'static>,
) -> http::Response<tonic::body::Body> {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    tracing::error!(panic = %detail, "gRPC handler panicked");

    Status::internal("internal server error").into_http()
}

#[cfg(test)]
mod tests {
    use tower::ServiceExt;
    use tower_http::catch_panic::CatchPanicLayer;

    use super::*;

    fn request_with(headers: &[(&'static str, &str)]) -> Request<()> {
        let mut request = Request::new(());
        for (key, value) in headers {
            request.metadata_mut().insert(*key, value.parse().unwrap());
        }
        request
    }

    #[test]
    fn attaches_user_id() {
        let request = intercept(request_with(&[(USER_ID_HEADER, "42")])).unwrap();
        assert_eq!(user_id(&request).unwrap(), UserId::new(42));
    }

    #[test]
    fn missing_user_id_passes_through() {
        let request = intercept(request_with(&[])).unwrap();
        assert_eq!(user_id(&request).unwrap_err(), AuthError::MissingIdentity);
    }

    #[test]
    fn malformed_user_id_is_unauthenticated() {
        let status = intercept(request_with(&[(USER_ID_HEADER, "abc")])).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn keeps_incoming_request_id() {
        let request = intercept(request_with(&[(REQUEST_ID_HEADER, "req-1")])).unwrap();
        assert_eq!(request_id(&request), "req-1");
    }

    #[test]
    fn keeps_incoming_trace_id() {
        let request = intercept(request_with(&[(TRACE_ID_HEADER, "trace-9")])).unwrap();
        assert_eq!(trace_id(&request), "trace-9");
    }

    #[test]
    fn generates_missing_correlation_ids() {
        let request = intercept(request_with(&[])).unwrap();

        assert!(Uuid::parse_str(&request_id(&request)).is_ok());
        assert!(Uuid::parse_str(&trace_id(&request)).is_ok());
    }

    #[test]
    fn user_id_requires_interceptor() {
        let request = request_with(&[(USER_ID_HEADER, "42")]);
        assert_eq!(user_id(&request).unwrap_err(), AuthError::MissingIdentity);
        assert_eq!(request_id(&request), "");
        assert_eq!(trace_id(&request), "");
    }

    #[test]
    fn version_header_is_attached() {
        let response = with_version(Response::new(()), "1.2.3");
        assert_eq!(
            response.metadata().get(SERVICE_VERSION_HEADER).unwrap(),
            "1.2.3"
        );
    }

    #[test]
    fn panic_payload_becomes_internal_status() {
        let response = panic_response(Box::new("boom"));

        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(response.headers().get("grpc-status").unwrap(), "13");
    }

    async fn exploding_handler(
        _request: http::Request<tonic::body::Body>,
    ) -> Result<http::Response<tonic::body::Body>, std::convert::Infallible> {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn catch_panic_layer_answers_with_internal() {
        let service = tower::ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(panic_response))
            .service_fn(exploding_handler);

        let response = service
            .oneshot(http::Request::new(tonic::body::Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.headers().get("grpc-status").unwrap(), "13");
    }
}
