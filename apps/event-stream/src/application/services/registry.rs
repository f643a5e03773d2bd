//! Session Registry
//!
//! Maps each user to their current `Session`. A user has at most one live
//! session: opening a second stream evicts and shuts down the first before
//! the new one becomes reachable.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::session::Session;
use crate::domain::identity::UserId;
use crate::infrastructure::metrics;

/// Registry of live sessions keyed by user.
pub struct SessionRegistry<M: Send + 'static> {
    sessions: Mutex<HashMap<UserId, Arc<Session<M>>>>,
}

impl<M: Send + 'static> SessionRegistry<M> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Install a new session for `user_id`, evicting any existing one.
    ///
    /// The previous session is shut down while the registry lock is held, so
    /// all of its subscriptions are cancelled before the new session can be
    /// looked up.
    pub fn acquire<F>(&self, user_id: UserId, factory: F) -> Arc<Session<M>>
    where
        F: FnOnce() -> Arc<Session<M>>,
    {
        let mut sessions = self.sessions.lock();
        if let Some(previous) = sessions.remove(&user_id) {
            previous.shutdown();
            metrics::record_session_evicted();
            tracing::info!(user_id = %user_id, "Superseded existing session");
        }

        let session = factory();
        sessions.insert(user_id, Arc::clone(&session));
        metrics::set_active_sessions(sessions.len());
        session
    }

    /// Get the live session for `user_id`, if any.
    #[must_use]
    pub fn lookup(&self, user_id: UserId) -> Option<Arc<Session<M>>> {
        self.sessions
            .lock()
            .get(&user_id)
            .filter(|session| !session.is_closed())
            .cloned()
    }

    /// Remove `session` if it is still the one registered for `user_id`.
    ///
    /// Returns `true` if the entry was removed. A stale session that has
    /// already been replaced leaves the newer entry untouched.
    pub fn release(&self, user_id: UserId, session: &Arc<Session<M>>) -> bool {
        let mut sessions = self.sessions.lock();
        let current = sessions
            .get(&user_id)
            .is_some_and(|stored| Arc::ptr_eq(stored, session));
        if current {
            sessions.remove(&user_id);
            metrics::set_active_sessions(sessions.len());
        }
        current
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Shut down and remove every session. Returns how many were closed.
    pub fn shutdown_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut sessions = self.sessions.lock();
            let drained = sessions.drain().map(|(_, session)| session).collect();
            metrics::set_active_sessions(0);
            drained
        };
        for session in &drained {
            session.shutdown();
        }
        drained.len()
    }
}

impl<M: Send + 'static> Default for SessionRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Send + 'static> std::fmt::Debug for SessionRegistry<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;
    use crate::application::ports::{EnvelopeMapper, EventSink, MapError, MessageBus, SinkError};
    use crate::application::services::SessionError;
    use crate::infrastructure::bus::{MemoryBus, MemoryBusConfig};

    struct ForwardSink(mpsc::UnboundedSender<Vec<u8>>);

    #[async_trait]
    impl EventSink<Vec<u8>> for ForwardSink {
        async fn send(&self, message: Vec<u8>) -> Result<(), SinkError> {
            self.0.send(message).map_err(|_| SinkError::Disconnected)
        }

        async fn closed(&self) {
            self.0.closed().await;
        }
    }

    struct RawMapper;

    impl EnvelopeMapper for RawMapper {
        type Output = Vec<u8>;

        fn map(&self, _topic: &str, payload: &[u8]) -> Result<Option<Vec<u8>>, MapError> {
            Ok(Some(payload.to_vec()))
        }
    }

    fn new_session(
        bus: &Arc<MemoryBus>,
        user_id: UserId,
    ) -> (Arc<Session<Vec<u8>>>, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(
            user_id,
            Arc::clone(bus) as Arc<dyn MessageBus>,
            Arc::new(RawMapper),
            Arc::new(ForwardSink(tx)),
        );
        (session, rx)
    }

    fn bus() -> Arc<MemoryBus> {
        Arc::new(MemoryBus::new(MemoryBusConfig::default()))
    }

    #[test]
    fn acquire_and_lookup() {
        let bus = bus();
        let registry = SessionRegistry::new();
        let user = UserId::new(1);

        assert!(registry.is_empty());
        let (session, _rx) = new_session(&bus, user);
        let acquired = registry.acquire(user, || Arc::clone(&session));

        assert!(Arc::ptr_eq(&acquired, &session));
        assert!(Arc::ptr_eq(&registry.lookup(user).unwrap(), &session));
        assert!(registry.lookup(UserId::new(2)).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn acquire_twice_evicts_previous_before_install() {
        let bus = bus();
        let registry = SessionRegistry::new();
        let user = UserId::new(1);

        let (first, _rx1) = new_session(&bus, user);
        registry.acquire(user, || Arc::clone(&first));
        first
            .add_topics(&["duel:1".to_string(), "duel:2".to_string()])
            .unwrap();

        let (second, _rx2) = new_session(&bus, user);
        let observed_first_closed = {
            let first = Arc::clone(&first);
            let second = Arc::clone(&second);
            move || {
                assert!(first.is_closed());
                assert_eq!(first.subscription_count(), 0);
                second
            }
        };
        registry.acquire(user, observed_first_closed);

        assert!(first.is_closed());
        assert!(Arc::ptr_eq(&registry.lookup(user).unwrap(), &second));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn stale_release_keeps_newer_session() {
        let bus = bus();
        let registry = SessionRegistry::new();
        let user = UserId::new(1);

        let (first, _rx1) = new_session(&bus, user);
        registry.acquire(user, || Arc::clone(&first));
        let (second, _rx2) = new_session(&bus, user);
        registry.acquire(user, || Arc::clone(&second));

        assert!(!registry.release(user, &first));
        assert!(Arc::ptr_eq(&registry.lookup(user).unwrap(), &second));

        assert!(registry.release(user, &second));
        assert!(registry.lookup(user).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn lookup_skips_closed_sessions() {
        let bus = bus();
        let registry = SessionRegistry::new();
        let user = UserId::new(5);

        let (session, _rx) = new_session(&bus, user);
        registry.acquire(user, || Arc::clone(&session));
        session.shutdown();

        assert!(registry.lookup(user).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn send_failure_makes_session_unreachable() {
        let bus = bus();
        let registry = SessionRegistry::new();
        let user = UserId::new(9);

        let (session, rx) = new_session(&bus, user);
        registry.acquire(user, || Arc::clone(&session));
        session.add_topics(&["duel:1".to_string()]).unwrap();
        drop(rx);

        bus.publish("duel:1", Bytes::from_static(b"x")).unwrap();

        timeout(Duration::from_secs(2), async {
            while !session.is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(registry.lookup(user).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acquire_leaves_one_live_session() {
        const WORKERS: usize = 8;
        const ROUNDS: usize = 40;

        let bus = bus();
        let registry = Arc::new(SessionRegistry::new());
        let user = UserId::new(11);

        let workers: Vec<_> = (0..WORKERS)
            .map(|worker| {
                let bus = Arc::clone(&bus);
                let registry = Arc::clone(&registry);
                tokio::task::spawn_blocking(move || {
                    let mut created = Vec::with_capacity(ROUNDS);
                    for round in 0..ROUNDS {
                        let (session, rx) = new_session(&bus, user);
                        let installed = registry.acquire(user, || Arc::clone(&session));
                        assert!(Arc::ptr_eq(&installed, &session));

                        // Loses the race with a newer acquire or subscribes live
                        match session.add_topics(&[format!("duel:{worker}-{round}")]) {
                            Ok(1) | Err(SessionError::Closed) => {}
                            other => panic!("unexpected add result: {other:?}"),
                        }

                        created.push((session, rx));
                    }
                    created
                })
            })
            .collect();

        let mut sessions = Vec::new();
        for worker in workers {
            sessions.extend(worker.await.unwrap());
        }

        let current = registry.lookup(user).unwrap();
        let live: Vec<_> = sessions.iter().filter(|(s, _)| !s.is_closed()).collect();
        assert_eq!(live.len(), 1);
        assert!(Arc::ptr_eq(&live[0].0, &current));
        assert_eq!(registry.len(), 1);

        for (session, _) in &sessions {
            if !Arc::ptr_eq(session, &current) {
                assert_eq!(session.subscription_count(), 0);
            }
        }

        // Only the surviving session keeps bus subscriptions open
        let expected = current.subscription_count();
        timeout(Duration::from_secs(2), async {
            while bus.stats().subscribers != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn shutdown_all_closes_everything() {
        let bus = bus();
        let registry = SessionRegistry::new();

        let sessions: Vec<_> = (1..=3)
            .map(|id| {
                let (session, _rx) = new_session(&bus, UserId::new(id));
                registry.acquire(UserId::new(id), || Arc::clone(&session))
            })
            .collect();

        assert_eq!(registry.shutdown_all(), 3);
        assert!(registry.is_empty());
        assert!(sessions.iter().all(|s| s.is_closed()));
    }
}
