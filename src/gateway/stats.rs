use std::sync::atomic::{AtomicU64, Ordering};

// -----------------------------------------------------------------------------
// ----- GatewayStats ----------------------------------------------------------

/// Counters bumped from the receive loop, the ACK writer and completion
/// callbacks. Relaxed ordering: these are for humans, not for synchronization.
#[derive(Debug, Default)]
pub struct GatewayStats {
    datagrams_received: AtomicU64,
    frames_malformed: AtomicU64,
    frames_oversized: AtomicU64,
    no_session_drops: AtomicU64,
    publishes: AtomicU64,
    acks_sent: AtomicU64,
    ack_send_failures: AtomicU64,
    late_completions: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub datagrams_received: u64,
    pub frames_malformed: u64,
    pub frames_oversized: u64,
    pub no_session_drops: u64,
    pub publishes: u64,
    pub acks_sent: u64,
    pub ack_send_failures: u64,
    pub late_completions: u64,
}

// -----------------------------------------------------------------------------
// ----- GatewayStats: Public --------------------------------------------------

impl GatewayStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            frames_oversized: self.frames_oversized.load(Ordering::Relaxed),
            no_session_drops: self.no_session_drops.load(Ordering::Relaxed),
            publishes: self.publishes.load(Ordering::Relaxed),
            acks_sent: self.acks_sent.load(Ordering::Relaxed),
            ack_send_failures: self.ack_send_failures.load(Ordering::Relaxed),
            late_completions: self.late_completions.load(Ordering::Relaxed),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- GatewayStats: Crate ---------------------------------------------------

impl GatewayStats {
    pub(crate) fn datagram_received(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_malformed(&self) {
        self.frames_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_oversized(&self) {
        self.frames_oversized.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn no_session(&self) {
        self.no_session_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn published(&self) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn ack_sent(&self) {
        self.acks_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn ack_send_failed(&self) {
        self.ack_send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn late_completion(&self) {
        self.late_completions.fetch_add(1, Ordering::Relaxed);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
