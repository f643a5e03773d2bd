//! gRPC Event Sink
//!
//! Adapts the response channel behind a server-streaming call to the
//! `EventSink` port.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tonic::Status;

use super::proto::giftduels::event::v1::StreamResponse;
use crate::application::ports::{EventSink, SinkError};

/// Outbound half of one `Stream` call.
#[derive(Debug, Clone)]
pub struct GrpcSink {
    tx: mpsc::Sender<Result<StreamResponse, Status>>,
}

impl GrpcSink {
    /// Wrap the sender feeding the call's `ReceiverStream`.
    #[must_use]
    pub const fn new(tx: mpsc::Sender<Result<StreamResponse, Status>>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink<StreamResponse> for GrpcSink {
    async fn send(&self, message: StreamResponse) -> Result<(), SinkError> {
        self.tx
            .send(Ok(message))
            .await
            .map_err(|_| SinkError::Disconnected)
    }

    async fn closed(&self) {
        self.tx.closed().await;
    }
}
