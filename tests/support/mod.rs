use bytes::Bytes;
use parking_lot::Mutex;
use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{net::UdpSocket, time::sleep};

use udpgate::GatewaySettings;
use udpgate::upstream::{
    Completion, PublishContext, SessionConnector, SessionEvents, SessionRequest, UpstreamSession,
};

// -----------------------------------------------------------------------------
// ----- RecordingConnector ----------------------------------------------------

/// Connector whose sessions keep every publish (and its completion) so a test
/// can decide when and how each one completes.
#[derive(Debug, Default)]
pub struct RecordingConnector {
    refuse_all: bool,
    next_id: AtomicU64,
    publishes: Arc<Mutex<Vec<Published>>>,
    events: Mutex<Vec<SessionEvents>>,
}

#[derive(Debug)]
pub struct Published {
    pub session_id: u64,
    pub topic: String,
    pub payload: Bytes,
    pub completion: Option<Completion>,
}

#[allow(dead_code)]
impl RecordingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Never establishes a session, so the pool stays empty.
    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            refuse_all: true,
            ..Self::default()
        })
    }

    pub fn take_publishes(&self) -> Vec<Published> {
        std::mem::take(&mut *self.publishes.lock())
    }

    pub fn publish_count(&self) -> usize {
        self.publishes.lock().len()
    }

    pub fn session_events(&self) -> Vec<SessionEvents> {
        self.events.lock().clone()
    }
}

impl SessionConnector for RecordingConnector {
    fn create_session(&self, request: SessionRequest) {
        if self.refuse_all {
            return;
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Arc::new(RecordingSession {
            id,
            publishes: self.publishes.clone(),
        });

        if request.events.established(session).is_some() {
            self.events.lock().push(request.events);
        }
    }
}

#[derive(Debug)]
struct RecordingSession {
    id: u64,
    publishes: Arc<Mutex<Vec<Published>>>,
}

impl UpstreamSession for RecordingSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn publish(&self, topic: &str, payload: Bytes, context: PublishContext) {
        self.publishes.lock().push(Published {
            session_id: self.id,
            topic: topic.to_owned(),
            payload,
            completion: context.into_completion(),
        });
    }
}

// -----------------------------------------------------------------------------
// ----- Helpers ---------------------------------------------------------------

pub fn settings(session_count: usize) -> GatewaySettings {
    GatewaySettings {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        session_count,
        reconnect_delay: Duration::from_millis(10),
        ..GatewaySettings::default()
    }
}

pub async fn client() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.expect("bind client socket")
}

/// Next datagram, or `None` if nothing arrives within `wait`.
#[allow(dead_code)]
pub async fn recv_within(socket: &UdpSocket, wait: Duration) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; 2048];
    match tokio::time::timeout(wait, socket.recv_from(&mut buf)).await {
        Ok(Ok((n, _))) => {
            buf.truncate(n);
            Some(buf)
        }
        _ => None,
    }
}

/// Polls `cond` every 10ms for up to two seconds.
pub async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[allow(dead_code)]
pub async fn send(socket: &UdpSocket, to: SocketAddr, datagram: &[u8]) {
    socket.send_to(datagram, to).await.expect("send datagram");
}
