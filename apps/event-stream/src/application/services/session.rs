//! Streaming Session
//!
//! A `Session` owns one client's live stream: the baseline broadcast
//! subscription, the set of per-duel topics the client asked for, and the
//! single outbound sink every topic writes through.
//!
//! # Concurrency
//!
//! - Each topic has its own forwarding task reading from the bus.
//! - Writes to the sink are serialized by an async mutex, so messages from
//!   different topics never interleave mid-send.
//! - The subscription map is guarded by a synchronous mutex that is never held
//!   across an `.await`. Removing a topic cancels its token while the lock is
//!   held, so the map and the running forwarders always agree.
//! - A send failure on any topic is fatal: it is reported once through a
//!   capacity-1 channel and cancels the whole session.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    BusError, EnvelopeMapper, EventSink, MapError, MessageBus, SinkError,
};
use crate::domain::envelope::Envelope;
use crate::domain::identity::UserId;
use crate::domain::topic::BASELINE_TOPIC;
use crate::infrastructure::metrics::{self, NackReason, TopicKind};

// =============================================================================
// Errors
// =============================================================================

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The bus refused a topic subscription.
    #[error("subscription failed: {0}")]
    Subscription(#[from] BusError),

    /// Delivery to the client failed; the session is over.
    #[error("failed to deliver to client: {0}")]
    Send(#[from] SinkError),

    /// The session has been shut down.
    #[error("session is closed")]
    Closed,

    /// `start` was called more than once.
    #[error("session already started")]
    AlreadyStarted,
}

// =============================================================================
// Session
// =============================================================================

struct Subscription {
    id: u64,
    token: CancellationToken,
}

/// One client's multiplexed event stream.
pub struct Session<M: Send + 'static> {
    user_id: UserId,
    bus: Arc<dyn MessageBus>,
    mapper: Arc<dyn EnvelopeMapper<Output = M>>,
    sink: Arc<dyn EventSink<M>>,
    write_lock: tokio::sync::Mutex<()>,
    subscriptions: Mutex<HashMap<String, Subscription>>,
    next_subscription_id: AtomicU64,
    cancel: CancellationToken,
    fatal_tx: mpsc::Sender<SessionError>,
    fatal_rx: Mutex<Option<mpsc::Receiver<SessionError>>>,
}

impl<M: Send + 'static> Session<M> {
    /// Create a session that is not yet subscribed to anything.
    #[must_use]
    pub fn new(
        user_id: UserId,
        bus: Arc<dyn MessageBus>,
        mapper: Arc<dyn EnvelopeMapper<Output = M>>,
        sink: Arc<dyn EventSink<M>>,
    ) -> Arc<Self> {
        let (fatal_tx, fatal_rx) = mpsc::channel(1);
        Arc::new(Self {
            user_id,
            bus,
            mapper,
            sink,
            write_lock: tokio::sync::Mutex::new(()),
            subscriptions: Mutex::new(HashMap::new()),
            next_subscription_id: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            fatal_tx,
            fatal_rx: Mutex::new(Some(fatal_rx)),
        })
    }

    /// Subscribe to the baseline topic and forward it on the calling task.
    ///
    /// Returns `Ok(())` once the baseline subscription ends, which happens
    /// when the session is shut down or the bus closes the topic.
    ///
    /// # Errors
    ///
    /// - `SessionError::Send` if delivery failed on any topic.
    /// - `SessionError::Subscription` if the bus refused the baseline topic.
    /// - `SessionError::Closed` if the session was already shut down.
    /// - `SessionError::AlreadyStarted` on a second call.
    pub async fn start(&self) -> Result<(), SessionError> {
        let mut fatal_rx = self
            .fatal_rx
            .lock()
            .take()
            .ok_or(SessionError::AlreadyStarted)?;
        if self.cancel.is_cancelled() {
            return Err(SessionError::Closed);
        }

        let rx = self.bus.subscribe(self.cancel.clone(), BASELINE_TOPIC)?;
        tracing::debug!(user_id = %self.user_id, topic = BASELINE_TOPIC, "Baseline subscription started");

        self.forward(BASELINE_TOPIC, &self.cancel, rx).await?;

        fatal_rx.try_recv().map_or(Ok(()), Err)
    }

    /// Subscribe to each topic not already in the subscription set.
    ///
    /// Returns the number of topics newly added. Topics added before a
    /// failure stay active.
    ///
    /// # Errors
    ///
    /// - `SessionError::Subscription` on the first topic the bus refuses.
    /// - `SessionError::Closed` if the session was shut down.
    pub fn add_topics(self: &Arc<Self>, topics: &[String]) -> Result<usize, SessionError> {
        let mut subscriptions = self.subscriptions.lock();
        if self.cancel.is_cancelled() {
            return Err(SessionError::Closed);
        }

        let mut added = 0;
        let mut result = Ok(());
        for topic in topics {
            if subscriptions.contains_key(topic) {
                continue;
            }

            let token = self.cancel.child_token();
            let rx = match self.bus.subscribe(token.clone(), topic) {
                Ok(rx) => rx,
                Err(e) => {
                    tracing::warn!(user_id = %self.user_id, topic = %topic, error = %e, "Topic subscription failed");
                    result = Err(SessionError::Subscription(e));
                    break;
                }
            };

            let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
            subscriptions.insert(
                topic.clone(),
                Subscription {
                    id,
                    token: token.clone(),
                },
            );
            self.spawn_forwarder(topic.clone(), id, token, rx);
            added += 1;
        }
        drop(subscriptions);

        if added > 0 {
            metrics::record_subscriptions_opened(added);
            tracing::debug!(user_id = %self.user_id, added, "Topics subscribed");
        }
        result.map(|()| added)
    }

    /// Cancel and forget each listed topic. Unknown topics are ignored.
    ///
    /// Returns the number of topics removed. Does not wait for the
    /// forwarding tasks to exit.
    pub fn remove_topics(&self, topics: &[String]) -> usize {
        let mut subscriptions = self.subscriptions.lock();
        let mut removed = 0;
        for topic in topics {
            if let Some(subscription) = subscriptions.remove(topic) {
                subscription.token.cancel();
                removed += 1;
            }
        }
        drop(subscriptions);

        if removed > 0 {
            metrics::record_subscriptions_closed(removed);
            tracing::debug!(user_id = %self.user_id, removed, "Topics unsubscribed");
        }
        removed
    }

    /// Cancel every subscription and end the session. Idempotent.
    pub fn shutdown(&self) {
        let mut subscriptions = self.subscriptions.lock();
        self.cancel.cancel();
        let closed = subscriptions.len();
        for (_, subscription) in subscriptions.drain() {
            subscription.token.cancel();
        }
        drop(subscriptions);

        if closed > 0 {
            metrics::record_subscriptions_closed(closed);
        }
    }

    /// Send a message through the serialized sink.
    ///
    /// Used for traffic that does not come from a topic, like heartbeats.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` after shutdown and
    /// `SessionError::Send` if the sink rejected the message.
    pub async fn send(&self, message: M) -> Result<(), SessionError> {
        let _guard = self.write_lock.lock().await;
        if self.cancel.is_cancelled() {
            return Err(SessionError::Closed);
        }
        self.sink.send(message).await.map_err(SessionError::Send)
    }

    /// Resolves once the client side of the sink has gone away.
    pub async fn sink_closed(&self) {
        self.sink.closed().await;
    }

    /// Identity this session belongs to.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Whether the session has been shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Currently subscribed per-duel topics, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.subscriptions.lock().keys().cloned().collect();
        topics.sort_unstable();
        topics
    }

    /// Number of active per-duel subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    // =========================================================================
    // Forwarding
    // =========================================================================

    fn spawn_forwarder(
        self: &Arc<Self>,
        topic: String,
        id: u64,
        token: CancellationToken,
        rx: mpsc::Receiver<Envelope>,
    ) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = session.forward(&topic, &token, rx).await {
                tracing::debug!(user_id = %session.user_id, topic = %topic, error = %e, "Forwarder stopped");
            }
            token.cancel();
            session.release_topic(&topic, id);
        });
    }

    /// Drop a topic entry only if it still belongs to the exiting forwarder.
    fn release_topic(&self, topic: &str, id: u64) {
        let mut subscriptions = self.subscriptions.lock();
        if subscriptions.get(topic).is_some_and(|s| s.id == id) {
            subscriptions.remove(topic);
            drop(subscriptions);
            metrics::record_subscriptions_closed(1);
        }
    }

    async fn forward(
        &self,
        topic: &str,
        token: &CancellationToken,
        mut rx: mpsc::Receiver<Envelope>,
    ) -> Result<(), SessionError> {
        let kind = TopicKind::of(topic);

        loop {
            let envelope = tokio::select! {
                biased;
                () = token.cancelled() => return Ok(()),
                next = rx.recv() => match next {
                    Some(envelope) => envelope,
                    None => return Ok(()),
                },
            };

            let message = match self.mapper.map(envelope.topic(), envelope.payload()) {
                Ok(Some(message)) => message,
                Ok(None) => {
                    envelope.ack();
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = %self.user_id,
                        topic,
                        message_id = %envelope.id(),
                        error = %e,
                        "Dropping unmappable message"
                    );
                    metrics::record_message_nacked(kind, nack_reason(&e));
                    envelope.nack();
                    continue;
                }
            };

            let sent = {
                let _guard = self.write_lock.lock().await;
                if token.is_cancelled() {
                    None
                } else {
                    Some(self.sink.send(message).await)
                }
            };

            match sent {
                None => {
                    metrics::record_message_nacked(kind, NackReason::Cancelled);
                    envelope.nack();
                    return Ok(());
                }
                Some(Ok(())) => {
                    metrics::record_message_forwarded(kind);
                    envelope.ack();
                }
                Some(Err(e)) => {
                    tracing::warn!(user_id = %self.user_id, topic, error = %e, "Client send failed, ending session");
                    metrics::record_message_nacked(kind, NackReason::SendFailed);
                    envelope.nack();
                    let err = SessionError::Send(e);
                    self.fail(err.clone());
                    return Err(err);
                }
            }
        }
    }

    /// Report a fatal error (first one wins) and cancel the session.
    fn fail(&self, err: SessionError) {
        let _ = self.fatal_tx.try_send(err);
        self.cancel.cancel();
    }
}

const fn nack_reason(err: &MapError) -> NackReason {
    match err {
        MapError::Decode { .. } => NackReason::Decode,
        MapError::UnrecognizedTopic(_) => NackReason::UnrecognizedTopic,
    }
}

impl<M: Send + 'static> fmt::Debug for Session<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("subscriptions", &self.subscription_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
