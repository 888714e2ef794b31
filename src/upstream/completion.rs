use std::fmt;

use crate::gateway::{AckSink, CorrelationToken};
use crate::wire::OutboundAck;

// -----------------------------------------------------------------------------
// ----- PublishContext --------------------------------------------------------

/// What the gateway attaches to a publish. Closed set: a session never has to
/// guess what its user data means.
#[derive(Debug)]
pub enum PublishContext {
    /// Sequence id 0. Nobody is waiting for the outcome.
    FireAndForget,

    /// Complete exactly once; the gateway turns it into an ACK.
    Acknowledged(Completion),
}

impl PublishContext {
    pub fn into_completion(self) -> Option<Completion> {
        match self {
            PublishContext::FireAndForget => None,
            PublishContext::Acknowledged(completion) => Some(completion),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- PublishOutcome --------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub result_code: i32,
    pub reason: Option<String>,
}

impl PublishOutcome {
    pub fn ok() -> Self {
        Self {
            result_code: 0,
            reason: None,
        }
    }

    pub fn failed(result_code: i32, reason: impl Into<String>) -> Self {
        Self {
            result_code,
            reason: Some(reason.into()),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Completion ------------------------------------------------------------

/// Consumed by `complete`, so an outcome can be reported at most once.
/// Safe to move to and complete from any thread.
pub struct Completion {
    token: CorrelationToken,
    sink: AckSink,
}

impl Completion {
    pub(crate) fn new(token: CorrelationToken, sink: AckSink) -> Self {
        Self { token, sink }
    }

    pub fn sequence_id(&self) -> u32 {
        self.token.sequence_id()
    }

    pub fn complete(self, outcome: PublishOutcome) {
        let (sequence_id, sender) = self.token.resolve();
        let ack = OutboundAck::new(sequence_id, outcome.result_code, outcome.reason);
        self.sink.send(sender, ack);
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
