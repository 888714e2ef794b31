use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    net::UdpSocket,
    select,
    sync::watch,
    task::JoinHandle,
    time::{sleep, timeout},
};
use tracing::{debug, info, trace, warn};

use super::{
    ack_writer::{AckSink, spawn_ack_writer},
    correlation::CorrelationToken,
    pool::ConnectionPool,
    stats::GatewayStats,
};
use crate::errors::GatewayError;
use crate::shared_types::ListenerStage;
use crate::upstream::{Completion, PublishContext};
use crate::wire::{FrameError, InboundFrame};

// -----------------------------------------------------------------------------
// ----- ListenerSettings ------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub bind_addr: SocketAddr,
    pub max_datagram_size: usize,
    pub stop_timeout: Duration,
}

// -----------------------------------------------------------------------------
// ----- IngestListener --------------------------------------------------------

/// Owns the UDP socket: one receive task and one ACK writer task.
///
/// The receive task handles strictly one datagram at a time: decode, pick a
/// session, publish, then read the next one. Nothing in that path waits on
/// the broker.
#[derive(Debug)]
pub struct IngestListener {
    stage: ListenerStage,
    settings: ListenerSettings,
    local_addr: Option<SocketAddr>,
    shutdown: Option<watch::Sender<bool>>,
    receive_task: Option<JoinHandle<()>>,
    writer_task: Option<JoinHandle<()>>,
}

// -----------------------------------------------------------------------------
// ----- IngestListener: Static ------------------------------------------------

impl IngestListener {
    pub fn new(settings: ListenerSettings) -> Self {
        Self {
            stage: ListenerStage::Idle,
            settings,
            local_addr: None,
            shutdown: None,
            receive_task: None,
            writer_task: None,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- IngestListener: Public ------------------------------------------------

impl IngestListener {
    pub fn stage(&self) -> ListenerStage {
        self.stage
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Binds and starts receiving. Bind failure is the one error that reaches
    /// the caller.
    pub async fn start(
        &mut self,
        pool: Arc<ConnectionPool>,
        stats: Arc<GatewayStats>,
    ) -> Result<SocketAddr, GatewayError> {
        if self.stage != ListenerStage::Idle {
            return Err(GatewayError::ListenerStage {
                expected: ListenerStage::Idle,
                found: self.stage,
            });
        }

        let addr = self.settings.bind_addr;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);

        let (acks, writer_task) = spawn_ack_writer(socket.clone(), stats.clone());
        let dispatcher = Dispatcher::new(pool, acks, stats, self.settings.max_datagram_size);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let receive_task = tokio::spawn(receive_loop(socket, dispatcher, shutdown_rx));

        self.local_addr = Some(local_addr);
        self.shutdown = Some(shutdown_tx);
        self.receive_task = Some(receive_task);
        self.writer_task = Some(writer_task);
        self.stage = ListenerStage::Listening;

        info!("listening for UDP frames on {local_addr}");
        Ok(local_addr)
    }

    /// Unblocks the pending receive and waits (bounded) for the loop to exit.
    /// Calling it on a listener that is not listening does nothing.
    pub async fn stop(&mut self) {
        if self.stage != ListenerStage::Listening {
            debug!("stop ignored; listener is {:?}", self.stage);
            return;
        }

        self.stage = ListenerStage::Draining;

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }

        if let Some(mut task) = self.receive_task.take() {
            if timeout(self.settings.stop_timeout, &mut task).await.is_err() {
                warn!(
                    "receive loop did not drain within {:?}; aborting",
                    self.settings.stop_timeout
                );
                task.abort();
                let _ = task.await;
            }
        }

        // Completions that arrive from here on are dropped by the sink.
        if let Some(task) = self.writer_task.take() {
            task.abort();
            let _ = task.await;
        }

        self.stage = ListenerStage::Stopped;
        info!("listener on {:?} stopped", self.local_addr);
    }
}

impl Drop for IngestListener {
    fn drop(&mut self) {
        if let Some(task) = self.receive_task.take() {
            task.abort();
        }
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Dispatcher ------------------------------------------------------------

/// Per-datagram work of the receive loop, kept free of socket I/O.
#[derive(Debug)]
pub struct Dispatcher {
    pool: Arc<ConnectionPool>,
    acks: AckSink,
    stats: Arc<GatewayStats>,
    max_datagram_size: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    Published { session_id: u64, acknowledged: bool },
    Malformed(FrameError),
    Oversized { len: usize },
    NoSession,
}

impl Dispatcher {
    pub fn new(
        pool: Arc<ConnectionPool>,
        acks: AckSink,
        stats: Arc<GatewayStats>,
        max_datagram_size: usize,
    ) -> Self {
        Self {
            pool,
            acks,
            stats,
            max_datagram_size,
        }
    }

    /// Read buffer length for the receive loop. One byte over the limit so a
    /// datagram the socket had to cut short is still recognizable as too big.
    pub fn buffer_len(&self) -> usize {
        self.max_datagram_size + 1
    }

    pub fn dispatch(&self, datagram: &[u8], sender: SocketAddr) -> Dispatch {
        self.stats.datagram_received();

        if datagram.len() > self.max_datagram_size {
            self.stats.frame_oversized();
            warn!(
                "dropping datagram from {sender}: larger than {} bytes",
                self.max_datagram_size
            );
            return Dispatch::Oversized {
                len: datagram.len(),
            };
        }

        let frame = match InboundFrame::from_bytes(datagram) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.frame_malformed();
                warn!(
                    "dropping malformed datagram from {sender} ({} bytes): {e}",
                    datagram.len()
                );
                return Dispatch::Malformed(e);
            }
        };

        let preferred = self.pool.random_index();
        let Some(session) = self.pool.select_slot(preferred) else {
            self.stats.no_session();
            warn!(
                "no upstream session available; dropping message {} on '{}' from {sender}",
                frame.sequence_id, frame.topic
            );
            return Dispatch::NoSession;
        };

        let context = match CorrelationToken::attach(frame.sequence_id, sender) {
            Some(token) => PublishContext::Acknowledged(Completion::new(token, self.acks.clone())),
            None => PublishContext::FireAndForget,
        };
        let acknowledged = matches!(context, PublishContext::Acknowledged(_));

        trace!(
            "publishing message {} on '{}' via session {} ({} bytes)",
            frame.sequence_id,
            frame.topic,
            session.id(),
            frame.payload.len()
        );

        session.publish(&frame.topic, frame.payload, context);
        self.stats.published();

        Dispatch::Published {
            session_id: session.id(),
            acknowledged,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Receive Loop ------------------------------------------------

async fn receive_loop(
    socket: Arc<UdpSocket>,
    dispatcher: Dispatcher,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; dispatcher.buffer_len()];
    let mut backoff = RecvBackoff::default();

    loop {
        select! {
            biased;

            _ = shutdown.changed() => break,

            recv_res = socket.recv_from(&mut buf) => {
                match recv_res {
                    Ok((n, sender)) => {
                        backoff.reset();
                        dispatcher.dispatch(&buf[..n], sender);
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        if backoff.should_log() {
                            warn!(
                                "udp receive error ({} in a row, retrying in {delay:?}): {e}",
                                backoff.consecutive
                            );
                        }
                        sleep(delay).await;
                    }
                }
            }
        }
    }

    debug!("receive loop exited");
}

// -----------------------------------------------------------------------------
// ----- Internal: RecvBackoff -------------------------------------------------

const RECV_BACKOFF_BASE: Duration = Duration::from_millis(10);
const RECV_BACKOFF_MAX: Duration = Duration::from_millis(250);
const RECV_ERROR_LOG_EVERY: u32 = 100;

/// Pause after a failed receive doubles up to a cap. Only the first failure of
/// a run and every hundredth after it gets logged.
#[derive(Debug, Default)]
struct RecvBackoff {
    consecutive: u32,
}

impl RecvBackoff {
    fn next_delay(&mut self) -> Duration {
        self.consecutive = self.consecutive.saturating_add(1);
        let shift = (self.consecutive - 1).min(5);
        (RECV_BACKOFF_BASE * (1u32 << shift)).min(RECV_BACKOFF_MAX)
    }

    fn should_log(&self) -> bool {
        self.consecutive % RECV_ERROR_LOG_EVERY == 1
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ack_writer::PendingAck;
    use crate::upstream::{PublishOutcome, UpstreamSession};
    use bytes::Bytes;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    #[derive(Debug, Default)]
    struct RecordingSession {
        published: Mutex<Vec<(String, Bytes, Option<Completion>)>>,
    }

    impl UpstreamSession for RecordingSession {
        fn id(&self) -> u64 {
            77
        }

        fn publish(&self, topic: &str, payload: Bytes, context: PublishContext) {
            self.published
                .lock()
                .push((topic.to_owned(), payload, context.into_completion()));
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        session: Arc<RecordingSession>,
        acks: mpsc::UnboundedReceiver<PendingAck>,
        stats: Arc<GatewayStats>,
    }

    fn harness(connected: bool) -> Harness {
        let (pool, _repairs) = ConnectionPool::new(2);
        let session = Arc::new(RecordingSession::default());
        if connected {
            pool.on_session_established(1, session.clone());
        }

        let stats = Arc::new(GatewayStats::default());
        let (sink, acks) = AckSink::detached(stats.clone());

        Harness {
            dispatcher: Dispatcher::new(pool, sink, stats.clone(), 64),
            session,
            acks,
            stats,
        }
    }

    fn sender() -> SocketAddr {
        "198.51.100.4:5555".parse().unwrap()
    }

    #[test]
    fn publishes_and_acks_to_original_sender() {
        let mut h = harness(true);

        let outcome = h.dispatcher.dispatch(b"MSG:7:temp/room1:23.5C", sender());
        assert_eq!(
            outcome,
            Dispatch::Published {
                session_id: 77,
                acknowledged: true
            }
        );

        let (topic, payload, completion) = h.session.published.lock().pop().unwrap();
        assert_eq!(topic, "temp/room1");
        assert_eq!(&payload[..], b"23.5C");
        assert!(h.session.published.lock().is_empty());

        completion.unwrap().complete(PublishOutcome::ok());

        let pending = h.acks.try_recv().unwrap();
        assert_eq!(pending.to, sender());
        assert_eq!(&pending.ack.to_bytes()[..], b"ACK:7:0");
        assert!(h.acks.try_recv().is_err());
    }

    #[test]
    fn failed_publish_acks_with_reason() {
        let mut h = harness(true);
        h.dispatcher.dispatch(b"MSG:8:t:x", sender());

        let (_, _, completion) = h.session.published.lock().pop().unwrap();
        completion
            .unwrap()
            .complete(PublishOutcome::failed(113, "destination full"));

        let pending = h.acks.try_recv().unwrap();
        assert_eq!(&pending.ack.to_bytes()[..], b"ACK:8:113:destination full");
    }

    #[test]
    fn fire_and_forget_never_acks() {
        let mut h = harness(true);

        let outcome = h.dispatcher.dispatch(b"MSG:0:t:x", sender());
        assert_eq!(
            outcome,
            Dispatch::Published {
                session_id: 77,
                acknowledged: false
            }
        );

        let (_, _, completion) = h.session.published.lock().pop().unwrap();
        assert!(completion.is_none());
        assert!(h.acks.try_recv().is_err());
    }

    #[test]
    fn malformed_datagrams_are_dropped() {
        let mut h = harness(true);

        for raw in ["", "MSG:", "MSG:5", "MSG:5:", "MSG:5:topic"] {
            let outcome = h.dispatcher.dispatch(raw.as_bytes(), sender());
            assert!(matches!(outcome, Dispatch::Malformed(_)), "input {raw:?}");
        }

        assert!(h.session.published.lock().is_empty());
        assert!(h.acks.try_recv().is_err());

        let stats = h.stats.snapshot();
        assert_eq!(stats.datagrams_received, 5);
        assert_eq!(stats.frames_malformed, 5);
        assert_eq!(stats.publishes, 0);
    }

    #[test]
    fn no_session_drops_message() {
        let mut h = harness(false);

        assert_eq!(
            h.dispatcher.dispatch(b"MSG:1:t:x", sender()),
            Dispatch::NoSession
        );
        assert!(h.acks.try_recv().is_err());
        assert_eq!(h.stats.snapshot().no_session_drops, 1);
    }

    #[test]
    fn oversized_datagrams_are_dropped_before_decoding() {
        let mut h = harness(true);
        assert_eq!(h.dispatcher.buffer_len(), 65);

        let mut datagram = b"MSG:1:t:".to_vec();
        datagram.resize(65, b'x');

        assert_eq!(
            h.dispatcher.dispatch(&datagram, sender()),
            Dispatch::Oversized { len: 65 }
        );
        assert!(h.session.published.lock().is_empty());
        assert!(h.acks.try_recv().is_err());

        // Exactly at the limit is still fine.
        datagram.truncate(64);
        assert!(matches!(
            h.dispatcher.dispatch(&datagram, sender()),
            Dispatch::Published { .. }
        ));

        let stats = h.stats.snapshot();
        assert_eq!(stats.frames_oversized, 1);
        assert_eq!(stats.publishes, 1);
    }

    #[test]
    fn recv_backoff_grows_caps_and_resets() {
        let mut backoff = RecvBackoff::default();

        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert!(backoff.should_log());
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        assert!(!backoff.should_log());

        for _ in 0..20 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), RECV_BACKOFF_MAX);

        while backoff.consecutive < RECV_ERROR_LOG_EVERY {
            backoff.next_delay();
        }
        backoff.next_delay();
        assert!(backoff.should_log());

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn start_rejects_second_call_and_stop_is_idempotent() {
        let (pool, _repairs) = ConnectionPool::new(1);
        let stats = Arc::new(GatewayStats::default());
        let mut listener = IngestListener::new(ListenerSettings {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            max_datagram_size: 1024,
            stop_timeout: Duration::from_secs(1),
        });

        let addr = listener.start(pool.clone(), stats.clone()).await.unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(listener.stage(), ListenerStage::Listening);

        let err = listener.start(pool, stats).await.unwrap_err();
        assert!(matches!(err, GatewayError::ListenerStage { .. }));

        listener.stop().await;
        assert_eq!(listener.stage(), ListenerStage::Stopped);
        listener.stop().await;
        assert_eq!(listener.stage(), ListenerStage::Stopped);
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let (pool, _repairs) = ConnectionPool::new(1);

        let mut listener = IngestListener::new(ListenerSettings {
            bind_addr: taken.local_addr().unwrap(),
            max_datagram_size: 1024,
            stop_timeout: Duration::from_secs(1),
        });

        let err = listener
            .start(pool, Arc::new(GatewayStats::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Bind { .. }));
        assert_eq!(listener.stage(), ListenerStage::Idle);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
