use std::net::SocketAddr;

use thiserror::Error;

use crate::shared_types::ListenerStage;

// -----------------------------------------------------------------------------
// ----- GatewayError ----------------------------------------------------------

/// Errors surfaced to whoever drives the gateway lifecycle.
///
/// Per-datagram problems (bad frames, no session, failed ACK sends) never show
/// up here; they are logged and counted where they happen.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("listener is {found:?}, expected {expected:?}")]
    ListenerStage {
        expected: ListenerStage,
        found: ListenerStage,
    },
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
