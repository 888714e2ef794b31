use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use tracing::debug;

use super::UpstreamSession;
use crate::gateway::ConnectionPool;
use crate::shared_types::{ReasonCode, SessionKind};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Slot marker for a handle whose session was refused or already reported lost.
const DETACHED: usize = usize::MAX;

// -----------------------------------------------------------------------------
// ----- SessionConnector ------------------------------------------------------

/// Asks the broker for new sessions.
///
/// `create_session` is fire-and-forget and must not block. The connector (or
/// the session it creates) later calls `SessionEvents::established` once, and
/// `SessionEvents::lost` when the session goes away or never came up.
pub trait SessionConnector: Send + Sync + 'static {
    fn create_session(&self, request: SessionRequest);
}

#[derive(Debug)]
pub struct SessionRequest {
    pub kind: SessionKind,
    pub endpoint: String,
    pub events: SessionEvents,
}

// -----------------------------------------------------------------------------
// ----- SessionEvents ---------------------------------------------------------

/// Callback handle tying one requested session to the pool.
///
/// Clones share the slot the session landed in. Holds the pool weakly, so a
/// session that outlives the gateway reports into nothing.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    pool: Weak<ConnectionPool>,
    slot: Arc<AtomicUsize>,
}

impl SessionEvents {
    pub(crate) fn new(pool: &Arc<ConnectionPool>, slot_hint: usize) -> Self {
        Self {
            pool: Arc::downgrade(pool),
            slot: Arc::new(AtomicUsize::new(slot_hint)),
        }
    }

    /// Slot the session occupies (or was requested for). `None` once detached.
    pub fn slot(&self) -> Option<usize> {
        match self.slot.load(Ordering::SeqCst) {
            DETACHED => None,
            slot => Some(slot),
        }
    }

    /// Returns the slot the session landed in, or `None` if the pool refused
    /// it. A refused session should be closed by its connector.
    pub fn established(&self, session: Arc<dyn UpstreamSession>) -> Option<usize> {
        let Some(hint) = self.slot() else {
            debug!("session {} established on a detached handle", session.id());
            return None;
        };

        let landed = self
            .pool
            .upgrade()
            .and_then(|pool| pool.on_session_established(hint, session));

        self.slot.store(landed.unwrap_or(DETACHED), Ordering::SeqCst);
        landed
    }

    /// Reports the loss once; later reports on this handle are no-ops.
    pub fn lost(&self, reason: ReasonCode) -> bool {
        let slot = self.slot.swap(DETACHED, Ordering::SeqCst);
        if slot == DETACHED {
            return false;
        }

        match self.pool.upgrade() {
            Some(pool) => pool.on_session_lost(slot, reason),
            None => false,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
