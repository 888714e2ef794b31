use std::{net::SocketAddr, sync::Arc};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{
    listener::IngestListener,
    pool::{ConnectionPool, PoolStats},
    repair::{RepairSettings, spawn_repair_worker},
    stats::{GatewayStats, StatsSnapshot},
};
use crate::config::GatewaySettings;
use crate::errors::GatewayError;
use crate::shared_types::GatewayStage;
use crate::upstream::SessionConnector;

// -----------------------------------------------------------------------------
// ----- Gateway ---------------------------------------------------------------

/// The host-facing entry points: start messaging, terminate.
#[derive(Debug)]
pub struct Gateway {
    stage: GatewayStage,
    pool: Arc<ConnectionPool>,
    listener: IngestListener,
    repair_task: Option<JoinHandle<()>>,
    stats: Arc<GatewayStats>,
    local_addr: SocketAddr,
}

// -----------------------------------------------------------------------------
// ----- Gateway: Static -------------------------------------------------------

impl Gateway {
    /// Allocates the pool, requests one session per slot, then starts the
    /// listener. Only a bind failure is returned as an error.
    pub async fn on_start_messaging(
        settings: GatewaySettings,
        connector: Arc<dyn SessionConnector>,
    ) -> Result<Self, GatewayError> {
        info!(
            "starting gateway: {} upstream sessions on endpoint '{}', listening on {}",
            settings.session_count, settings.endpoint, settings.bind_addr
        );

        let (pool, repairs) = ConnectionPool::new(settings.session_count);
        let repair_task = spawn_repair_worker(
            pool.clone(),
            connector,
            repairs,
            RepairSettings {
                endpoint: settings.endpoint.clone(),
                reconnect_delay: settings.reconnect_delay,
            },
        );

        pool.request_initial_sessions();

        let stats = Arc::new(GatewayStats::default());
        let mut listener = IngestListener::new(settings.listener());

        let local_addr = match listener.start(pool.clone(), stats.clone()).await {
            Ok(addr) => addr,
            Err(e) => {
                pool.mark_terminating();
                repair_task.abort();
                pool.close_all();
                return Err(e);
            }
        };

        Ok(Self {
            stage: GatewayStage::Running,
            pool,
            listener,
            repair_task: Some(repair_task),
            stats,
            local_addr,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Gateway: Public -------------------------------------------------------

impl Gateway {
    /// Stops reconnects first, then the listener, then releases the sessions.
    /// Idempotent.
    pub async fn on_terminate(&mut self, reason: &str) {
        if self.stage != GatewayStage::Running {
            debug!("terminate ignored; gateway is {:?}", self.stage);
            return;
        }

        info!("terminating gateway: {reason}");
        self.stage = GatewayStage::Terminating;
        self.pool.mark_terminating();

        self.listener.stop().await;

        if let Some(task) = self.repair_task.take() {
            task.abort();
            let _ = task.await;
        }

        let released = self.pool.close_all();
        let stats = self.stats.snapshot();

        info!(
            released_sessions = released.len(),
            received = stats.datagrams_received,
            malformed = stats.frames_malformed,
            oversized = stats.frames_oversized,
            no_session = stats.no_session_drops,
            published = stats.publishes,
            acks_sent = stats.acks_sent,
            ack_failures = stats.ack_send_failures,
            late_completions = stats.late_completions,
            "gateway terminated"
        );

        self.stage = GatewayStage::Terminated;
    }

    pub fn stage(&self) -> GatewayStage {
        self.stage
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.pool.mark_terminating();
        if let Some(task) = self.repair_task.take() {
            task.abort();
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
