//! Duel Event Stream Binary
//!
//! Starts the duel event streaming service.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin duel-event-stream
//! ```
//!
//! # Environment Variables
//!
//! - `APP_ENV`: development | production (default: development)
//! - `EVENT_STREAM_GRPC_PORT`: gRPC server port (default: 50052)
//! - `EVENT_STREAM_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `EVENT_STREAM_HEARTBEAT_INTERVAL_SECS`: Stream keep-alive interval (default: 10)
//! - `EVENT_STREAM_OUTBOUND_CAPACITY`: Buffered responses per stream (default: 256)
//! - `EVENT_STREAM_TOPIC_CAPACITY`: Bus buffer per topic (default: 1024)
//! - `EVENT_STREAM_SUBSCRIPTION_CAPACITY`: Bus queue per subscription (default: 64)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: giftduels-event-stream)
//! - `RUST_LOG`: Log filter (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use duel_event_stream::infrastructure::grpc::proto::giftduels::event::v1::event_public_service_server::EventPublicServiceServer;
use duel_event_stream::infrastructure::health::{HealthServer, HealthServerState};
use duel_event_stream::infrastructure::telemetry;
use duel_event_stream::{
    EventStreamServer, EventStreamServerConfig, MemoryBus, MemoryBusConfig, MessageBus,
    StreamConfig, StreamRegistry, init_metrics, intercept, panic_response,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tonic::codegen::InterceptedService;
use tonic::transport::Server;
use tower_http::catch_panic::CatchPanicLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A provider may already be installed by a dependency.
    let _ = rustls::crypto::ring::default_provider().install_default();

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let telemetry_guard = telemetry::init();

    tracing::info!(
        trace_export = telemetry_guard.is_exporting(),
        "Starting duel event stream"
    );

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics().context("failed to install metrics recorder")?;

    let config = StreamConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Message bus and session registry
    let bus = Arc::new(MemoryBus::new(MemoryBusConfig::from(config.bus)));
    let registry = Arc::new(StreamRegistry::new());

    // Initialize gRPC server
    let grpc_server = Arc::new(EventStreamServer::new(
        EventStreamServerConfig::from(&config.session),
        Arc::clone(&registry),
        Arc::clone(&bus) as Arc<dyn MessageBus>,
    ));

    // Initialize health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&registry),
        Arc::clone(&bus),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );

    // Spawn health server
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Spawn gRPC server
    let grpc_addr = SocketAddr::from(([0, 0, 0, 0], config.server.grpc_port));
    let grpc_service =
        InterceptedService::new(EventPublicServiceServer::from_arc(grpc_server), intercept);
    let grpc_shutdown = shutdown_token.clone();

    let grpc_handle = tokio::spawn(async move {
        tracing::info!(addr = %grpc_addr, "gRPC server listening");
        if let Err(e) = Server::builder()
            .layer(CatchPanicLayer::custom(panic_response))
            .add_service(grpc_service)
            .serve_with_shutdown(grpc_addr, grpc_shutdown.cancelled())
            .await
        {
            tracing::error!(error = %e, "gRPC server error");
        }
        tracing::info!("gRPC server stopped");
    });

    tracing::info!("Duel event stream ready");

    await_shutdown(shutdown_token).await;

    // Open streams end once their sessions are cancelled, which lets the
    // gRPC server finish draining.
    let closed = registry.shutdown_all();
    bus.close();
    tracing::info!(sessions = closed, "Sessions closed");

    if let Err(e) = grpc_handle.await {
        tracing::error!(error = %e, "gRPC server task failed");
    }

    tracing::info!("Duel event stream stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &StreamConfig) {
    tracing::info!(
        environment = config.environment.as_str(),
        grpc_port = config.server.grpc_port,
        health_port = config.server.health_port,
        heartbeat_interval_secs = config.session.heartbeat_interval.as_secs(),
        outbound_capacity = config.session.outbound_capacity,
        topic_capacity = config.bus.topic_capacity,
        subscription_capacity = config.bus.subscription_capacity,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
    tracing::info!("Graceful shutdown started");
}
