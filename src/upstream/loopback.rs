//! In-process stand-in for a broker.
//!
//! Sessions connect immediately and every publish succeeds with result code 0,
//! completed on a spawned task so ACKs are never sent from the receive loop.
//! `disconnect` drops a live session with a chosen reason, which is how the
//! binary and the tests exercise self-healing without a real broker.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use super::{
    PublishContext, PublishOutcome, SessionConnector, SessionEvents, SessionRequest,
    UpstreamSession,
};
use crate::shared_types::ReasonCode;

// -----------------------------------------------------------------------------
// ----- LoopbackConnector -----------------------------------------------------

#[derive(Debug, Default)]
pub struct LoopbackConnector {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, SessionEvents>>,
    created: AtomicU64,
}

impl LoopbackConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of the sessions currently placed in the pool.
    pub fn live_sessions(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.live.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Total sessions ever created, refused ones included.
    pub fn sessions_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Drops a live session as if the broker had closed it.
    pub fn disconnect(&self, session_id: u64, reason: ReasonCode) -> bool {
        let Some(events) = self.live.lock().remove(&session_id) else {
            return false;
        };

        info!("loopback session {session_id} disconnected ({reason})");
        events.lost(reason);
        true
    }
}

impl SessionConnector for LoopbackConnector {
    fn create_session(&self, request: SessionRequest) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.created.fetch_add(1, Ordering::Relaxed);

        let session = Arc::new(LoopbackSession {
            id,
            endpoint: request.endpoint,
        });

        match request.events.established(session) {
            Some(slot) => {
                debug!("loopback session {id} placed in slot {slot}");
                self.live.lock().insert(id, request.events);
            }
            None => warn!("loopback session {id} refused by pool"),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- LoopbackSession -------------------------------------------------------

#[derive(Debug)]
struct LoopbackSession {
    id: u64,
    endpoint: String,
}

impl UpstreamSession for LoopbackSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn publish(&self, topic: &str, payload: Bytes, context: PublishContext) {
        info!(
            "[{}#{}] {topic}: {} bytes",
            self.endpoint,
            self.id,
            payload.len()
        );

        let Some(completion) = context.into_completion() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { completion.complete(PublishOutcome::ok()) });
            }
            Err(_) => completion.complete(PublishOutcome::ok()),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ConnectionPool;
    use crate::shared_types::SessionKind;

    fn request(pool: &Arc<ConnectionPool>, slot: usize) -> SessionRequest {
        SessionRequest {
            kind: SessionKind::Publisher,
            endpoint: "udp".into(),
            events: SessionEvents::new(pool, slot),
        }
    }

    #[test]
    fn sessions_land_in_pool_and_can_be_dropped() {
        let (pool, mut rx) = ConnectionPool::new(2);
        let connector = LoopbackConnector::new();

        connector.create_session(request(&pool, 0));
        connector.create_session(request(&pool, 1));
        assert_eq!(pool.stats().connected, 2);
        assert_eq!(connector.live_sessions(), vec![1, 2]);

        assert!(connector.disconnect(1, ReasonCode::ConnectionError));
        assert!(!connector.disconnect(1, ReasonCode::ConnectionError));
        assert_eq!(pool.stats().connected, 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn refused_sessions_are_not_tracked() {
        let (pool, _rx) = ConnectionPool::new(1);
        let connector = LoopbackConnector::new();

        connector.create_session(request(&pool, 0));
        connector.create_session(request(&pool, 0));

        assert_eq!(connector.sessions_created(), 2);
        assert_eq!(connector.live_sessions(), vec![1]);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
