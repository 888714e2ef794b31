use bytes::Bytes;
use std::fmt::Debug;

use super::PublishContext;

// -----------------------------------------------------------------------------
// ----- UpstreamSession -------------------------------------------------------

/// One long-lived connection to the broker, owned by the pool.
///
/// `publish` must not block: the receive loop calls it inline for every
/// datagram. It has no error return; rejections are reported as a non-zero
/// result code through the `Completion` in `context` (and are silent for
/// fire-and-forget publishes).
pub trait UpstreamSession: Send + Sync + Debug {
    fn id(&self) -> u64;

    fn publish(&self, topic: &str, payload: Bytes, context: PublishContext);
}
