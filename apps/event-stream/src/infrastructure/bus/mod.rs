//! In-Memory Message Bus
//!
//! Implements the `MessageBus` port using tokio broadcast channels for
//! efficient fan-out to every subscriber of a topic.
//!
//! # Architecture
//!
//! Each topic owns one `broadcast::Sender`, created on first subscription.
//! Every subscription gets a pump task that bridges the broadcast receiver
//! into a bounded `mpsc` queue of `Envelope`s until its cancellation token
//! fires or the bus is closed. Envelope settlements are tallied in a shared
//! ledger that backs the health endpoint and tests.
//!
//! A subscriber that falls more than `topic_capacity` messages behind skips
//! the overflow; the skip is logged and counted but never acked or nacked,
//! since those deliveries were never handed out.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::ports::{BusError, MessageBus};
use crate::domain::envelope::{Acknowledger, Envelope, Settlement};
use crate::infrastructure::config::BusSettings;
use crate::infrastructure::metrics::{self, TopicKind};

// =============================================================================
// Configuration
// =============================================================================

/// Capacities for the in-memory bus.
#[derive(Debug, Clone, Copy)]
pub struct MemoryBusConfig {
    /// Broadcast buffer per topic.
    pub topic_capacity: usize,
    /// Queue depth between the broadcast receiver and one subscriber.
    pub subscription_capacity: usize,
}

impl Default for MemoryBusConfig {
    fn default() -> Self {
        Self {
            topic_capacity: 1_024,
            subscription_capacity: 64,
        }
    }
}

impl From<BusSettings> for MemoryBusConfig {
    fn from(settings: BusSettings) -> Self {
        Self {
            topic_capacity: settings.topic_capacity,
            subscription_capacity: settings.subscription_capacity,
        }
    }
}

// =============================================================================
// Acknowledgement Ledger
// =============================================================================

#[derive(Debug, Clone)]
struct Published {
    id: Uuid,
    payload: Bytes,
}

#[derive(Debug, Default)]
struct AckLedger {
    delivered: AtomicU64,
    acked: AtomicU64,
    nacked: AtomicU64,
}

impl Acknowledger for AckLedger {
    fn settle(&self, id: Uuid, topic: &str, settlement: Settlement) {
        match settlement {
            Settlement::Ack => self.acked.fetch_add(1, Ordering::Relaxed),
            Settlement::Nack => {
                tracing::trace!(message_id = %id, topic, "Delivery nacked");
                self.nacked.fetch_add(1, Ordering::Relaxed)
            }
        };
    }
}

// =============================================================================
// Memory Bus
// =============================================================================

/// Process-local `MessageBus`.
///
/// # Example
///
/// ```rust
/// use bytes::Bytes;
/// use duel_event_stream::application::ports::MessageBus;
/// use duel_event_stream::infrastructure::bus::MemoryBus;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = MemoryBus::with_defaults();
/// let cancel = CancellationToken::new();
/// let mut rx = bus.subscribe(cancel.clone(), "duel:1").unwrap();
///
/// bus.publish("duel:1", Bytes::from_static(b"event")).unwrap();
/// let envelope = rx.recv().await.unwrap();
/// envelope.ack();
/// cancel.cancel();
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryBus {
    config: MemoryBusConfig,
    topics: RwLock<HashMap<String, broadcast::Sender<Published>>>,
    ledger: Arc<AckLedger>,
    published: AtomicU64,
    closed: CancellationToken,
}

impl MemoryBus {
    /// Create a new bus with the given configuration.
    #[must_use]
    pub fn new(config: MemoryBusConfig) -> Self {
        Self {
            config,
            topics: RwLock::new(HashMap::new()),
            ledger: Arc::new(AckLedger::default()),
            published: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Create a new bus with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(MemoryBusConfig::default())
    }

    /// Number of live subscriptions to `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Stop every subscription and reject further use.
    pub fn close(&self) {
        self.closed.cancel();
        self.topics.write().clear();
        tracing::info!("Message bus closed");
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Get delivery statistics.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        let topics = self.topics.read();
        BusStats {
            topics: topics.len(),
            subscribers: topics.values().map(broadcast::Sender::receiver_count).sum(),
            published: self.published.load(Ordering::Relaxed),
            delivered: self.ledger.delivered.load(Ordering::Relaxed),
            acked: self.ledger.acked.load(Ordering::Relaxed),
            nacked: self.ledger.nacked.load(Ordering::Relaxed),
        }
    }

    /// Prune idle topics and join `topic` under a single write guard.
    ///
    /// The receiver must exist before the guard drops, otherwise a
    /// concurrent prune can discard the freshly created sender.
    fn receiver_for(&self, topic: &str) -> broadcast::Receiver<Published> {
        let mut topics = self.topics.write();
        topics.retain(|_, tx| tx.receiver_count() > 0);
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.config.topic_capacity).0)
            .subscribe()
    }
}

impl MessageBus for MemoryBus {
    fn subscribe(
        &self,
        cancel: CancellationToken,
        topic: &str,
    ) -> Result<mpsc::Receiver<Envelope>, BusError> {
        if topic.trim().is_empty() {
            return Err(BusError::InvalidTopic(topic.to_string()));
        }
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        let source = self.receiver_for(topic);
        let (tx, rx) = mpsc::channel(self.config.subscription_capacity);

        tokio::spawn(pump(
            topic.to_string(),
            source,
            tx,
            cancel,
            self.closed.clone(),
            Arc::clone(&self.ledger),
        ));

        Ok(rx)
    }

    fn publish(&self, topic: &str, payload: Bytes) -> Result<usize, BusError> {
        if topic.trim().is_empty() {
            return Err(BusError::InvalidTopic(topic.to_string()));
        }
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        self.published.fetch_add(1, Ordering::Relaxed);
        let message = Published {
            id: Uuid::new_v4(),
            payload,
        };
        Ok(self
            .topics
            .read()
            .get(topic)
            .and_then(|tx| tx.send(message).ok())
            .unwrap_or(0))
    }
}

/// Bridge one broadcast receiver into a subscriber queue.
async fn pump(
    topic: String,
    mut source: broadcast::Receiver<Published>,
    tx: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
    closed: CancellationToken,
    ledger: Arc<AckLedger>,
) {
    let kind = TopicKind::of(&topic);

    loop {
        let published = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = closed.cancelled() => break,
            received = source.recv() => match received {
                Ok(published) => published,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(topic = %topic, lagged = n, "Bus subscriber lagged");
                    metrics::record_bus_lagged(kind, n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        ledger.delivered.fetch_add(1, Ordering::Relaxed);
        let envelope = Envelope::new(
            published.id,
            topic.as_str(),
            published.payload,
            Arc::clone(&ledger) as Arc<dyn Acknowledger>,
        );

        // An envelope that never reaches the subscriber is nacked on drop.
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            sent = tx.send(envelope) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

/// Statistics about the bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Topics with a live broadcast channel.
    pub topics: usize,
    /// Live subscriptions across all topics.
    pub subscribers: usize,
    /// Messages accepted by `publish`.
    pub published: u64,
    /// Envelopes handed to subscriber queues.
    pub delivered: u64,
    /// Envelopes acked.
    pub acked: u64,
    /// Envelopes nacked, including ones dropped unsettled.
    pub nacked: u64,
}

// =============================================================================
// Tests
// =============================================================================
