//! Session Lifecycle Integration Tests
//!
//! Tests session replacement, cleanup on disconnect, heartbeats, and
//! shutdown of live streams.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use prost::Message;
use tokio::time::timeout;
use tonic::transport::{Channel, Server};
use tonic::{Code, Request};

use duel_event_stream::{
    BASELINE_TOPIC, EventStreamServer, EventStreamServerConfig, MemoryBus, MessageBus,
    StreamRegistry, UserId, intercept,
    proto::{
        duel::v1::DuelCreatedEvent,
        event::v1::{
            StreamRequest, StreamResponse, SubscribeDuelsRequest,
            event_public_service_client::EventPublicServiceClient,
            event_public_service_server::EventPublicServiceServer,
        },
        shared::v1::DuelId,
    },
};

const WAIT: Duration = Duration::from_secs(2);

struct TestServer {
    client: EventPublicServiceClient<Channel>,
    bus: Arc<MemoryBus>,
    registry: Arc<StreamRegistry>,
    handle: tokio::task::JoinHandle<()>,
}

async fn setup_test_server(heartbeat_interval: Duration) -> TestServer {
    let bus = Arc::new(MemoryBus::with_defaults());
    let registry = Arc::new(StreamRegistry::new());

    let config = EventStreamServerConfig {
        version: "test-0.0.1".to_string(),
        heartbeat_interval,
        outbound_capacity: 64,
    };

    let server = EventStreamServer::new(
        config,
        Arc::clone(&registry),
        Arc::clone(&bus) as Arc<dyn MessageBus>,
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        Server::builder()
            .add_service(EventPublicServiceServer::with_interceptor(server, intercept))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = EventPublicServiceClient::connect(format!("http://{addr}"))
        .await
        .unwrap();

    TestServer {
        client,
        bus,
        registry,
        handle,
    }
}

fn as_user<T>(message: T, user_id: i64) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert("x-telegram-user-id", user_id.to_string().parse().unwrap());
    request
}

async fn open_stream(
    client: &mut EventPublicServiceClient<Channel>,
    user_id: i64,
) -> tonic::Streaming<StreamResponse> {
    client
        .stream(as_user(StreamRequest {}, user_id))
        .await
        .unwrap()
        .into_inner()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timeout waiting for condition");
}

fn created_payload(display_number: i64) -> Bytes {
    Bytes::from(
        DuelCreatedEvent {
            display_number,
            ..Default::default()
        }
        .encode_to_vec(),
    )
}

// =============================================================================
// Replacement Tests
// =============================================================================

#[tokio::test]
async fn test_second_stream_replaces_first() {
    let TestServer {
        mut client,
        bus,
        registry,
        handle,
    } = setup_test_server(Duration::from_secs(60)).await;

    let mut first = open_stream(&mut client, 5).await;
    wait_until(|| bus.subscriber_count(BASELINE_TOPIC) == 1).await;

    client
        .subscribe_duels(as_user(
            SubscribeDuelsRequest {
                duel_ids: vec![DuelId {
                    value: "D1".to_string(),
                }],
            },
            5,
        ))
        .await
        .unwrap();
    assert_eq!(bus.subscriber_count("duel:D1"), 1);

    let mut second = open_stream(&mut client, 5).await;

    // The first stream ends cleanly and its subscriptions are gone
    let ended = timeout(WAIT, first.message()).await.unwrap().unwrap();
    assert!(ended.is_none());
    wait_until(|| bus.subscriber_count("duel:D1") == 0).await;
    wait_until(|| bus.subscriber_count(BASELINE_TOPIC) == 1).await;
    assert_eq!(registry.len(), 1);

    bus.publish(BASELINE_TOPIC, created_payload(2)).unwrap();
    let received = timeout(WAIT, second.message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(received.payload.is_some());

    handle.abort();
}

#[tokio::test]
async fn test_disconnect_releases_session() {
    let TestServer {
        mut client,
        bus,
        registry,
        handle,
    } = setup_test_server(Duration::from_secs(60)).await;

    let stream = open_stream(&mut client, 7).await;
    wait_until(|| bus.subscriber_count(BASELINE_TOPIC) == 1).await;
    assert!(registry.lookup(UserId::new(7)).is_some());

    drop(stream);

    wait_until(|| registry.is_empty()).await;
    wait_until(|| bus.subscriber_count(BASELINE_TOPIC) == 0).await;

    // The identity has no session to subscribe on anymore
    let status = client
        .subscribe_duels(as_user(
            SubscribeDuelsRequest {
                duel_ids: vec![DuelId {
                    value: "D1".to_string(),
                }],
            },
            7,
        ))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);

    handle.abort();
}

// =============================================================================
// Heartbeat and Shutdown Tests
// =============================================================================

#[tokio::test]
async fn test_idle_stream_receives_heartbeats() {
    let TestServer {
        mut client, handle, ..
    } = setup_test_server(Duration::from_millis(50)).await;

    let mut stream = open_stream(&mut client, 8).await;

    for _ in 0..2 {
        let heartbeat = timeout(WAIT, stream.message())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(heartbeat, StreamResponse::default());
    }

    handle.abort();
}

#[tokio::test]
async fn test_shutdown_all_ends_live_streams() {
    let TestServer {
        mut client,
        bus,
        registry,
        handle,
    } = setup_test_server(Duration::from_secs(60)).await;

    let mut first = open_stream(&mut client, 20).await;
    let mut second = open_stream(&mut client, 21).await;
    wait_until(|| bus.subscriber_count(BASELINE_TOPIC) == 2).await;

    assert_eq!(registry.shutdown_all(), 2);

    for stream in [&mut first, &mut second] {
        let ended = timeout(WAIT, stream.message()).await.unwrap().unwrap();
        assert!(ended.is_none());
    }
    wait_until(|| bus.subscriber_count(BASELINE_TOPIC) == 0).await;

    handle.abort();
}

#[tokio::test]
async fn test_closed_bus_fails_stream() {
    let TestServer {
        mut client,
        bus,
        handle,
        ..
    } = setup_test_server(Duration::from_secs(60)).await;

    bus.close();

    // The failure may surface on the call itself or as the first stream item
    let status = match client.stream(as_user(StreamRequest {}, 30)).await {
        Ok(response) => {
            let mut stream = response.into_inner();
            timeout(WAIT, stream.message()).await.unwrap().unwrap_err()
        }
        Err(status) => status,
    };
    assert_eq!(status.code(), Code::Internal);

    handle.abort();
}
