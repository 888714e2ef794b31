use std::{net::SocketAddr, num::NonZeroU32};

// -----------------------------------------------------------------------------
// ----- CorrelationToken ------------------------------------------------------

/// Rides along with one acknowledged publish so its completion can address the
/// ACK. The token is the whole state; nothing is stored on the gateway side.
///
/// Sequence id 0 means fire-and-forget and can never produce a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationToken {
    sequence_id: NonZeroU32,
    sender: SocketAddr,
}

// -----------------------------------------------------------------------------
// ----- CorrelationToken: Static ----------------------------------------------

impl CorrelationToken {
    pub fn attach(sequence_id: u32, sender: SocketAddr) -> Option<Self> {
        let sequence_id = NonZeroU32::new(sequence_id)?;
        Some(Self {
            sequence_id,
            sender,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- CorrelationToken: Public ----------------------------------------------

impl CorrelationToken {
    pub fn resolve(self) -> (u32, SocketAddr) {
        (self.sequence_id.get(), self.sender)
    }

    pub fn sequence_id(&self) -> u32 {
        self.sequence_id.get()
    }

    pub fn sender(&self) -> SocketAddr {
        self.sender
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
