use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::shared_types::ReasonCode;
use crate::upstream::UpstreamSession;

// -----------------------------------------------------------------------------
// ----- ConnectionPool --------------------------------------------------------

/// Fixed-size arena of upstream session slots.
///
/// The slot array never changes size after construction. Every read or write of
/// a slot goes through the single pool-wide lock, so a reader always sees a
/// slot's state and session together.
///
/// Repairs are not performed here. A lost slot becomes `Connecting` and one
/// `RepairRequest` is pushed on the repair queue; whoever drains the queue asks
/// the broker for a new session.
pub struct ConnectionPool {
    slots: Mutex<Box<[Slot]>>,
    terminating: AtomicBool,
    repairs: mpsc::UnboundedSender<RepairRequest>,
}

/// Public view of a slot, without the session handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairRequest {
    pub slot: usize,
    pub cause: RepairCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairCause {
    /// One of the sessions requested when the gateway starts.
    Startup,

    /// Replacement for a session that went away.
    Lost(ReasonCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub slots: usize,
    pub connected: usize,
    pub connecting: usize,
    pub empty: usize,
}

enum Slot {
    Empty,
    Connecting,
    Connected(Arc<dyn UpstreamSession>),
}

// -----------------------------------------------------------------------------
// ----- ConnectionPool: Static ------------------------------------------------

impl ConnectionPool {
    /// `size` is clamped to at least one slot.
    pub fn new(size: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<RepairRequest>) {
        let size = size.max(1);
        let (repairs, rx) = mpsc::unbounded_channel();

        let slots = (0..size).map(|_| Slot::Empty).collect::<Vec<_>>();

        let pool = Arc::new(Self {
            slots: Mutex::new(slots.into_boxed_slice()),
            terminating: AtomicBool::new(false),
            repairs,
        });

        (pool, rx)
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionPool: Public ------------------------------------------------

impl ConnectionPool {
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Issues one startup request for every empty slot.
    pub fn request_initial_sessions(&self) -> usize {
        let mut slots = self.slots.lock();
        if self.is_terminating() {
            return 0;
        }

        let mut issued = 0;

        for (index, slot) in slots.iter_mut().enumerate() {
            if matches!(slot, Slot::Empty) {
                *slot = Slot::Connecting;
                self.push_repair(RepairRequest {
                    slot: index,
                    cause: RepairCause::Startup,
                });
                issued += 1;
            }
        }

        info!("requested {issued} upstream sessions");
        issued
    }

    /// Uniform over `[0, len)`.
    pub fn random_index(&self) -> usize {
        rand::rng().random_range(0..self.len())
    }

    /// First connected session at or after `preferred`, wrapping around.
    pub fn select_slot(&self, preferred: usize) -> Option<Arc<dyn UpstreamSession>> {
        let slots = self.slots.lock();
        let len = slots.len();

        (0..len)
            .map(|offset| (preferred + offset) % len)
            .find_map(|index| match &slots[index] {
                Slot::Connected(session) => Some(session.clone()),
                _ => None,
            })
    }

    /// Records a newly connected session and returns the slot it landed in.
    ///
    /// The hinted slot is used unless it already holds a session; then the
    /// first empty slot, then the first connecting one. Placement is not
    /// stable across repairs, only the live count is. Returns `None` (and the
    /// caller should close the session) when every slot is connected or the
    /// gateway is terminating.
    pub fn on_session_established(
        &self,
        index: usize,
        session: Arc<dyn UpstreamSession>,
    ) -> Option<usize> {
        let mut slots = self.slots.lock();

        // Checked under the lock so `close_all` either sees this session or
        // this call sees the flag.
        if self.is_terminating() {
            debug!(
                "refusing session {} for slot {index}: gateway terminating",
                session.id()
            );
            return None;
        }

        let target = Some(index)
            .filter(|&i| i < slots.len() && !matches!(slots[i], Slot::Connected(_)))
            .or_else(|| slots.iter().position(|s| matches!(s, Slot::Empty)))
            .or_else(|| slots.iter().position(|s| matches!(s, Slot::Connecting)));

        let Some(target) = target else {
            warn!(
                "refusing session {}: all {} slots connected",
                session.id(),
                slots.len()
            );
            return None;
        };

        info!("session {} connected in slot {target}", session.id());
        slots[target] = Slot::Connected(session);
        Some(target)
    }

    /// Clears the slot and, when the reason allows it and the gateway is still
    /// running, queues exactly one replacement. Returns whether one was queued.
    ///
    /// A report for a slot that is already empty is a duplicate and ignored.
    pub fn on_session_lost(&self, index: usize, reason: ReasonCode) -> bool {
        let mut slots = self.slots.lock();

        let Some(slot) = slots.get_mut(index) else {
            warn!("session lost for unknown slot {index}");
            return false;
        };

        if matches!(slot, Slot::Empty) {
            debug!("ignoring duplicate loss for empty slot {index} ({reason})");
            return false;
        }

        *slot = Slot::Empty;

        if self.is_terminating() {
            debug!("slot {index} lost ({reason}) while terminating; not reconnecting");
            return false;
        }

        if !reason.allows_reconnect() {
            warn!("slot {index} lost ({reason}); not reconnecting");
            return false;
        }

        warn!("slot {index} lost ({reason}); requesting replacement");
        *slot = Slot::Connecting;
        self.push_repair(RepairRequest {
            slot: index,
            cause: RepairCause::Lost(reason),
        });

        true
    }

    pub fn mark_terminating(&self) {
        self.terminating.store(true, Ordering::SeqCst);
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }

    /// Empties every slot and hands the sessions back for teardown.
    pub fn close_all(&self) -> Vec<Arc<dyn UpstreamSession>> {
        let mut slots = self.slots.lock();

        slots
            .iter_mut()
            .filter_map(|slot| match std::mem::replace(slot, Slot::Empty) {
                Slot::Connected(session) => Some(session),
                _ => None,
            })
            .collect()
    }

    pub fn slot_state(&self, index: usize) -> Option<SlotState> {
        self.slots.lock().get(index).map(Slot::state)
    }

    pub fn stats(&self) -> PoolStats {
        let slots = self.slots.lock();
        let mut stats = PoolStats {
            slots: slots.len(),
            connected: 0,
            connecting: 0,
            empty: 0,
        };

        for slot in slots.iter() {
            match slot.state() {
                SlotState::Connected => stats.connected += 1,
                SlotState::Connecting => stats.connecting += 1,
                SlotState::Empty => stats.empty += 1,
            }
        }

        stats
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionPool: Private -----------------------------------------------

impl ConnectionPool {
    fn push_repair(&self, request: RepairRequest) {
        if self.repairs.send(request).is_err() {
            debug!("repair queue closed; dropping request for slot {}", request.slot);
        }
    }
}

impl Slot {
    fn state(&self) -> SlotState {
        match self {
            Slot::Empty => SlotState::Empty,
            Slot::Connecting => SlotState::Connecting,
            Slot::Connected(_) => SlotState::Connected,
        }
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("stats", &self.stats())
            .field("terminating", &self.is_terminating())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
