//! gRPC Event Stream Server Implementation
//!
//! Implements the `EventPublicService` gRPC service on top of the session
//! registry.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::Instrument;

use super::interceptors;
use super::mapper::DuelEventMapper;
use super::proto::giftduels::event::v1::{
    StreamRequest, StreamResponse, SubscribeDuelsRequest, SubscribeDuelsResponse,
    UnsubscribeDuelsRequest, UnsubscribeDuelsResponse,
    event_public_service_server::EventPublicService,
};
use super::proto::giftduels::shared::v1::DuelId;
use super::sink::GrpcSink;
use super::status::HandlerError;
use crate::application::ports::{EnvelopeMapper, MessageBus};
use crate::application::services::{Session, SessionError, SessionRegistry};
use crate::domain::identity::UserId;
use crate::domain::topic::Topic;
use crate::infrastructure::config::SessionSettings;
use crate::infrastructure::metrics;

// =============================================================================
// Type Aliases
// =============================================================================

type StreamResult<T> = Result<Response<T>, Status>;
type BoxedStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Registry of live stream sessions keyed by user.
pub type StreamRegistry = SessionRegistry<StreamResponse>;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the gRPC event stream server.
#[derive(Debug, Clone)]
pub struct EventStreamServerConfig {
    /// Service version string reported in `x-service-version`.
    pub version: String,
    /// Interval between keep-alive messages.
    pub heartbeat_interval: Duration,
    /// Buffered responses per stream.
    pub outbound_capacity: usize,
}

impl Default for EventStreamServerConfig {
    fn default() -> Self {
        let session = SessionSettings::default();
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            heartbeat_interval: session.heartbeat_interval,
            outbound_capacity: session.outbound_capacity,
        }
    }
}

impl From<&SessionSettings> for EventStreamServerConfig {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            heartbeat_interval: settings.heartbeat_interval,
            outbound_capacity: settings.outbound_capacity,
            ..Self::default()
        }
    }
}

// =============================================================================
// Server Implementation
// =============================================================================

/// gRPC server multiplexing duel events into per-client streams.
pub struct EventStreamServer {
    config: EventStreamServerConfig,
    registry: Arc<StreamRegistry>,
    bus: Arc<dyn MessageBus>,
    mapper: Arc<dyn EnvelopeMapper<Output = StreamResponse>>,
}

impl EventStreamServer {
    /// Create a new gRPC event stream server.
    #[must_use]
    pub fn new(
        config: EventStreamServerConfig,
        registry: Arc<StreamRegistry>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            config,
            registry,
            bus,
            mapper: Arc::new(DuelEventMapper::new()),
        }
    }

    /// Session registry shared with the health endpoint and shutdown path.
    #[must_use]
    pub fn registry(&self) -> Arc<StreamRegistry> {
        Arc::clone(&self.registry)
    }

    fn respond<T>(&self, message: T) -> Response<T> {
        interceptors::with_version(Response::new(message), &self.config.version)
    }

    fn live_session(
        &self,
        user_id: UserId,
    ) -> Result<Arc<Session<StreamResponse>>, HandlerError> {
        self.registry
            .lookup(user_id)
            .ok_or(HandlerError::SessionNotEstablished)
    }
}

/// Convert requested duel ids into scoped topic names.
///
/// An empty list yields no topics, which makes the request a no-op.
fn duel_topics(ids: &[DuelId]) -> Result<Vec<String>, HandlerError> {
    ids.iter()
        .map(|id| Topic::duel(&id.value).map(|topic| topic.to_string()))
        .collect::<Result<_, _>>()
        .map_err(HandlerError::from)
}

#[tonic::async_trait]
impl EventPublicService for EventStreamServer {
    type StreamStream = BoxedStream<StreamResponse>;

    async fn stream(&self, request: Request<StreamRequest>) -> StreamResult<Self::StreamStream> {
        let user_id = interceptors::user_id(&request)?;
        let request_id = interceptors::request_id(&request);
        let trace_id = interceptors::trace_id(&request);

        let (tx, rx) = mpsc::channel(self.config.outbound_capacity);
        let session = self.registry.acquire(user_id, || {
            Session::new(
                user_id,
                Arc::clone(&self.bus),
                Arc::clone(&self.mapper),
                Arc::new(GrpcSink::new(tx.clone())),
            )
        });
        let span = tracing::info_span!(
            "event_stream",
            user_id = %user_id,
            request_id = %request_id,
            trace_id = %trace_id
        );
        span.in_scope(|| tracing::info!("Stream opened"));

        let start_task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start().await }
        });

        tokio::spawn(
            drive(
                session,
                Arc::clone(&self.registry),
                tx,
                start_task,
                self.config.heartbeat_interval,
            )
            .instrument(span),
        );

        let stream = ReceiverStream::new(rx);
        Ok(self.respond(Box::pin(stream) as Self::StreamStream))
    }

    async fn subscribe_duels(
        &self,
        request: Request<SubscribeDuelsRequest>,
    ) -> StreamResult<SubscribeDuelsResponse> {
        let user_id = interceptors::user_id(&request)?;
        let request_id = interceptors::request_id(&request);
        let trace_id = interceptors::trace_id(&request);

        let session = self.live_session(user_id)?;
        let topics = duel_topics(&request.get_ref().duel_ids)?;

        let added = session.add_topics(&topics).map_err(|e| {
            tracing::warn!(
                user_id = %user_id,
                request_id = %request_id,
                trace_id = %trace_id,
                error = %e,
                "Subscribe failed"
            );
            Status::from(e)
        })?;
        tracing::info!(
            user_id = %user_id,
            request_id = %request_id,
            trace_id = %trace_id,
            requested = topics.len(),
            added,
            "Duels subscribed"
        );

        Ok(self.respond(SubscribeDuelsResponse {}))
    }

    async fn unsubscribe_duels(
        &self,
        request: Request<UnsubscribeDuelsRequest>,
    ) -> StreamResult<UnsubscribeDuelsResponse> {
        let user_id = interceptors::user_id(&request)?;
        let request_id = interceptors::request_id(&request);
        let trace_id = interceptors::trace_id(&request);

        let session = self.live_session(user_id)?;
        let topics = duel_topics(&request.get_ref().duel_ids)?;

        let removed = session.remove_topics(&topics);
        tracing::info!(
            user_id = %user_id,
            request_id = %request_id,
            trace_id = %trace_id,
            requested = topics.len(),
            removed,
            "Duels unsubscribed"
        );

        Ok(self.respond(UnsubscribeDuelsResponse {}))
    }
}

// =============================================================================
// Stream Driver
// =============================================================================

enum StreamExit {
    ClientGone,
    Ended,
    Failed(Status),
}

/// Owns one `Stream` call until the client leaves or the session ends.
///
/// Runs inside the call's span, which carries the user and correlation ids.
async fn drive(
    session: Arc<Session<StreamResponse>>,
    registry: Arc<StreamRegistry>,
    tx: mpsc::Sender<Result<StreamResponse, Status>>,
    mut start_task: JoinHandle<Result<(), SessionError>>,
    heartbeat_interval: Duration,
) {
    let user_id = session.user_id();
    let mut heartbeat =
        tokio::time::interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let exit = loop {
        tokio::select! {
            biased;
            () = session.sink_closed() => break StreamExit::ClientGone,
            joined = &mut start_task => break match joined {
                Ok(Ok(())) => StreamExit::Ended,
                Ok(Err(e)) => StreamExit::Failed(Status::from(e)),
                Err(e) => {
                    StreamExit::Failed(Status::internal(format!("session task failed: {e}")))
                }
            },
            _ = heartbeat.tick() => match session.send(StreamResponse::default()).await {
                Ok(()) => metrics::record_heartbeat(),
                Err(SessionError::Closed) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "Heartbeat failed");
                    break StreamExit::ClientGone;
                }
            },
        }
    };

    registry.release(user_id, &session);
    session.shutdown();
    if !start_task.is_finished() {
        start_task.abort();
    }

    match exit {
        StreamExit::ClientGone => {
            tracing::info!("Client disconnected");
        }
        StreamExit::Ended => {
            tracing::info!("Stream ended");
        }
        StreamExit::Failed(status) => {
            tracing::warn!(
                code = ?status.code(),
                message = status.message(),
                "Stream failed"
            );
            if tx.try_send(Err(status)).is_err() {
                tracing::debug!("Terminal status dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use prost::Message;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    use super::*;
    use crate::domain::topic::BASELINE_TOPIC;
    use crate::infrastructure::bus::MemoryBus;
    use crate::infrastructure::grpc::proto::giftduels::duel::v1::DuelCreatedEvent;
    use crate::infrastructure::grpc::proto::giftduels::event::v1::stream_response;

    const WAIT: Duration = Duration::from_secs(2);

    fn setup(heartbeat_interval: Duration) -> (EventStreamServer, Arc<MemoryBus>) {
        let bus = Arc::new(MemoryBus::with_defaults());
        let server = EventStreamServer::new(
            EventStreamServerConfig {
                version: "test".to_string(),
                heartbeat_interval,
                outbound_capacity: 16,
            },
            Arc::new(StreamRegistry::new()),
            Arc::clone(&bus) as Arc<dyn MessageBus>,
        );
        (server, bus)
    }

    fn authed<T>(message: T, user: i64) -> Request<T> {
        let mut request = Request::new(message);
        request.extensions_mut().insert(UserId::new(user));
        request
    }

    fn ids(values: &[&str]) -> Vec<DuelId> {
        values
            .iter()
            .map(|v| DuelId {
                value: (*v).to_string(),
            })
            .collect()
    }

    async fn wait_for_subscribers(bus: &MemoryBus, topic: &str, count: usize) {
        timeout(WAIT, async {
            while bus.subscriber_count(topic) != count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn duel_topics_are_scoped() {
        assert_eq!(
            duel_topics(&ids(&["a", "b"])).unwrap(),
            vec!["duel:a".to_string(), "duel:b".to_string()]
        );
        assert!(duel_topics(&[]).unwrap().is_empty());
        assert!(matches!(
            duel_topics(&ids(&["a", ""])),
            Err(HandlerError::InvalidDuelId(_))
        ));
    }

    #[tokio::test]
    async fn stream_requires_identity() {
        let (server, _bus) = setup(Duration::from_secs(60));
        let status = server.stream(Request::new(StreamRequest {})).await.err().unwrap();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
    }

    #[tokio::test]
    async fn subscribe_requires_session() {
        let (server, _bus) = setup(Duration::from_secs(60));
        let status = server
            .subscribe_duels(authed(SubscribeDuelsRequest { duel_ids: ids(&["a"]) }, 1))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);
    }

    #[tokio::test]
    async fn stream_delivers_baseline_and_subscribed_topics() {
        let (server, bus) = setup(Duration::from_secs(60));
        let response = server.stream(authed(StreamRequest {}, 7)).await.unwrap();
        assert_eq!(
            response.metadata().get(interceptors::SERVICE_VERSION_HEADER).unwrap(),
            "test"
        );
        let mut stream = response.into_inner();
        wait_for_subscribers(&bus, BASELINE_TOPIC, 1).await;

        let created = DuelCreatedEvent {
            display_number: 1,
            ..Default::default()
        };
        bus.publish(BASELINE_TOPIC, Bytes::from(created.encode_to_vec()))
            .unwrap();
        let first = timeout(WAIT, stream.next()).await.unwrap().unwrap().unwrap();
        assert!(matches!(
            first.payload,
            Some(stream_response::Payload::DuelEvent(_))
        ));

        server
            .subscribe_duels(authed(SubscribeDuelsRequest { duel_ids: ids(&["d1"]) }, 7))
            .await
            .unwrap();
        assert_eq!(bus.subscriber_count("duel:d1"), 1);

        server
            .unsubscribe_duels(authed(UnsubscribeDuelsRequest { duel_ids: ids(&["d1"]) }, 7))
            .await
            .unwrap();
        wait_for_subscribers(&bus, "duel:d1", 0).await;
    }

    #[tokio::test]
    async fn idle_stream_receives_heartbeats() {
        let (server, _bus) = setup(Duration::from_millis(20));
        let mut stream = server
            .stream(authed(StreamRequest {}, 9))
            .await
            .unwrap()
            .into_inner();

        let heartbeat = timeout(WAIT, stream.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(heartbeat, StreamResponse::default());
    }

    #[tokio::test]
    async fn dropped_stream_releases_session() {
        let (server, bus) = setup(Duration::from_secs(60));
        let registry = server.registry();
        let stream = server
            .stream(authed(StreamRequest {}, 3))
            .await
            .unwrap()
            .into_inner();
        wait_for_subscribers(&bus, BASELINE_TOPIC, 1).await;
        assert!(registry.lookup(UserId::new(3)).is_some());

        drop(stream);

        wait_for_subscribers(&bus, BASELINE_TOPIC, 0).await;
        timeout(WAIT, async {
            while registry.lookup(UserId::new(3)).is_some() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn closed_bus_ends_stream_with_status() {
        let (server, bus) = setup(Duration::from_secs(60));
        bus.close();

        let mut stream = server
            .stream(authed(StreamRequest {}, 4))
            .await
            .unwrap()
            .into_inner();

        let status = timeout(WAIT, stream.next()).await.unwrap().unwrap().unwrap_err();
        assert_eq!(status.code(), tonic::Code::Internal);
    }
}
