//! Drains the pool's repair queue and asks the connector for sessions.
//!
//! Startup requests go out immediately. Replacements for lost sessions wait
//! `reconnect_delay` first so a flapping broker does not get hammered.

use std::{sync::Arc, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use tracing::{debug, info};

use super::pool::{ConnectionPool, RepairCause, RepairRequest};
use crate::shared_types::SessionKind;
use crate::upstream::{SessionConnector, SessionEvents, SessionRequest};

// -----------------------------------------------------------------------------
// ----- RepairSettings --------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct RepairSettings {
    pub(crate) endpoint: String,
    pub(crate) reconnect_delay: Duration,
}

// -----------------------------------------------------------------------------
// ----- Worker ----------------------------------------------------------------

pub(crate) fn spawn_repair_worker(
    pool: Arc<ConnectionPool>,
    connector: Arc<dyn SessionConnector>,
    mut rx: mpsc::UnboundedReceiver<RepairRequest>,
    settings: RepairSettings,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            if let RepairCause::Lost(reason) = request.cause {
                debug!(
                    "slot {} lost ({reason}); reconnecting in {:?}",
                    request.slot, settings.reconnect_delay
                );
                sleep(settings.reconnect_delay).await;
            }

            if pool.is_terminating() {
                debug!("dropping repair for slot {}: terminating", request.slot);
                continue;
            }

            info!(
                "creating upstream session for slot {} on endpoint '{}'",
                request.slot, settings.endpoint
            );

            connector.create_session(SessionRequest {
                kind: SessionKind::Publisher,
                endpoint: settings.endpoint.clone(),
                events: SessionEvents::new(&pool, request.slot),
            });
        }
    })
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
