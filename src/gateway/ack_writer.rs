//! Single writer for the UDP send path.
//!
//! Completion callbacks arrive on arbitrary threads, possibly concurrently.
//! They only push onto an unbounded channel; one task owns the actual
//! `send_to` calls, so sends never interleave and never touch the receive loop.

use std::{net::SocketAddr, sync::Arc};

use tokio::{net::UdpSocket, sync::mpsc, task::JoinHandle};
use tracing::{debug, trace, warn};

use super::stats::GatewayStats;
use crate::wire::OutboundAck;

// -----------------------------------------------------------------------------
// ----- AckSink ---------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AckSink {
    tx: mpsc::UnboundedSender<PendingAck>,
    stats: Arc<GatewayStats>,
}

#[derive(Debug)]
pub(crate) struct PendingAck {
    pub(crate) to: SocketAddr,
    pub(crate) ack: OutboundAck,
}

// -----------------------------------------------------------------------------
// ----- AckSink: Public -------------------------------------------------------

impl AckSink {
    /// Best effort. If the writer is gone (gateway stopped) the ACK is dropped.
    pub fn send(&self, to: SocketAddr, ack: OutboundAck) {
        let sequence_id = ack.sequence_id;

        if self.tx.send(PendingAck { to, ack }).is_err() {
            self.stats.late_completion();
            debug!("ack writer stopped; dropping ACK {sequence_id} for {to}");
        }
    }
}

// -----------------------------------------------------------------------------
// ----- AckSink: Test Helpers -------------------------------------------------

impl AckSink {
    /// Sink whose queue is handed to the test instead of a writer task.
    #[cfg(test)]
    pub(crate) fn detached(stats: Arc<GatewayStats>) -> (Self, mpsc::UnboundedReceiver<PendingAck>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, stats }, rx)
    }
}

// -----------------------------------------------------------------------------
// ----- Writer Task -----------------------------------------------------------

pub(crate) fn spawn_ack_writer(
    socket: Arc<UdpSocket>,
    stats: Arc<GatewayStats>,
) -> (AckSink, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<PendingAck>();

    let sink = AckSink {
        tx,
        stats: stats.clone(),
    };

    let handle = tokio::spawn(async move {
        while let Some(pending) = rx.recv().await {
            let bytes = pending.ack.to_bytes();

            match socket.send_to(&bytes, pending.to).await {
                Ok(_) => {
                    stats.ack_sent();
                    trace!(
                        "sent ACK {} rc={} to {}",
                        pending.ack.sequence_id, pending.ack.result_code, pending.to
                    );
                }
                Err(e) => {
                    stats.ack_send_failed();
                    warn!(
                        "failed to send ACK {} to {}: {e}",
                        pending.ack.sequence_id, pending.to
                    );
                }
            }
        }
    });

    (sink, handle)
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn writes_encoded_ack_to_target() {
        let server = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let stats = Arc::new(GatewayStats::default());

        let (sink, _handle) = spawn_ack_writer(server, stats.clone());
        sink.send(
            client.local_addr().unwrap(),
            OutboundAck::new(7, 0, None),
        );

        let mut buf = [0u8; 64];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(&buf[..n], b"ACK:7:0");
        assert_eq!(stats.snapshot().acks_sent, 1);
    }

    #[tokio::test]
    async fn send_after_writer_stops_is_swallowed() {
        let server = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let stats = Arc::new(GatewayStats::default());

        let (sink, handle) = spawn_ack_writer(server, stats.clone());
        handle.abort();
        let _ = handle.await;

        sink.send("127.0.0.1:9".parse().unwrap(), OutboundAck::new(1, 0, None));
        assert_eq!(stats.snapshot().late_completions, 1);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
