//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Delivery**: Messages forwarded to clients and deliveries nacked
//! - **Sessions**: Active sessions, evictions, heartbeats
//! - **Subscriptions**: Active per-duel topic subscriptions
//! - **Bus**: Messages skipped by lagging subscribers
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Calling this again after a successful install returns the existing handle.
///
/// # Errors
///
/// Returns `BuildError` if the global recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "event_stream_messages_forwarded_total",
        "Total bus messages delivered to client streams"
    );
    describe_counter!(
        "event_stream_messages_nacked_total",
        "Total bus deliveries rejected by reason"
    );
    describe_counter!(
        "event_stream_heartbeats_total",
        "Total keepalive heartbeats sent to client streams"
    );
    describe_counter!(
        "event_stream_sessions_evicted_total",
        "Total sessions replaced by a newer stream for the same user"
    );
    describe_counter!(
        "event_stream_bus_lagged_total",
        "Total bus messages skipped by lagging subscribers"
    );

    describe_gauge!(
        "event_stream_active_sessions",
        "Number of sessions reachable through the registry"
    );
    describe_gauge!(
        "event_stream_active_subscriptions",
        "Number of active per-duel topic subscriptions"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for topic kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    /// Lifecycle broadcast topic.
    Broadcast,
    /// Per-duel scoped topic.
    Duel,
}

impl TopicKind {
    /// Classify a topic name.
    #[must_use]
    pub fn of(topic: &str) -> Self {
        if topic.contains(':') {
            Self::Duel
        } else {
            Self::Broadcast
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Broadcast => "broadcast",
            Self::Duel => "duel",
        }
    }
}

/// Metric labels for nack reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
    /// Payload failed to decode.
    Decode,
    /// Mapper did not recognize the topic.
    UnrecognizedTopic,
    /// Topic was cancelled before the message was sent.
    Cancelled,
    /// Client stream rejected the send.
    SendFailed,
}

impl NackReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::UnrecognizedTopic => "unrecognized_topic",
            Self::Cancelled => "cancelled",
            Self::SendFailed => "send_failed",
        }
    }
}

/// Record a message delivered to a client.
pub fn record_message_forwarded(kind: TopicKind) {
    counter!(
        "event_stream_messages_forwarded_total",
        "topic_kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a nacked delivery.
pub fn record_message_nacked(kind: TopicKind, reason: NackReason) {
    counter!(
        "event_stream_messages_nacked_total",
        "topic_kind" => kind.as_str(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record a heartbeat sent to a client.
pub fn record_heartbeat() {
    counter!("event_stream_heartbeats_total").increment(1);
}

/// Record a session replaced by a newer stream.
pub fn record_session_evicted() {
    counter!("event_stream_sessions_evicted_total").increment(1);
}

/// Record messages skipped by a lagging bus subscriber.
pub fn record_bus_lagged(kind: TopicKind, count: u64) {
    counter!(
        "event_stream_bus_lagged_total",
        "topic_kind" => kind.as_str()
    )
    .increment(count);
}

/// Update the active session count.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_sessions(count: usize) {
    gauge!("event_stream_active_sessions").set(count as f64);
}

/// Record topic subscriptions opened by a session.
#[allow(clippy::cast_precision_loss)]
pub fn record_subscriptions_opened(count: usize) {
    gauge!("event_stream_active_subscriptions").increment(count as f64);
}

/// Record topic subscriptions closed by a session.
#[allow(clippy::cast_precision_loss)]
pub fn record_subscriptions_closed(count: usize) {
    gauge!("event_stream_active_subscriptions").decrement(count as f64);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_kind_classification() {
        assert_eq!(TopicKind::of("duel.created"), TopicKind::Broadcast);
        assert_eq!(TopicKind::of("duel:42"), TopicKind::Duel);
        assert_eq!(TopicKind::Broadcast.as_str(), "broadcast");
        assert_eq!(TopicKind::Duel.as_str(), "duel");
    }

    #[test]
    fn nack_reason_as_str() {
        assert_eq!(NackReason::Decode.as_str(), "decode");
        assert_eq!(NackReason::UnrecognizedTopic.as_str(), "unrecognized_topic");
        assert_eq!(NackReason::Cancelled.as_str(), "cancelled");
        assert_eq!(NackReason::SendFailed.as_str(), "send_failed");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_message_forwarded(TopicKind::Duel);
        record_message_nacked(TopicKind::Broadcast, NackReason::Decode);
        record_heartbeat();
        record_subscriptions_opened(2);
        record_subscriptions_closed(2);
    }
}
