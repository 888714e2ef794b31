use parking_lot::RwLock;
use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
};

use tracing::warn;

use super::{cli::CliConfig, gateway::GatewaySettings, types::LogLevel};

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static ROOT_CONFIG: OnceLock<Arc<RwLock<Config>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Config {
    pub gateway: GatewaySettings,
    pub log_level: LogLevel,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    /// Panics on a bad config file. Do not start with a bad state.
    pub async fn init() {
        CliConfig::init();

        Self::load().await;
    }

    pub fn snapshot() -> Config {
        Self::handle().read().clone()
    }
}

// -----------------------------------------------------------------------------
// ----- Config: Private -------------------------------------------------------

impl Config {
    async fn load() {
        let cli = CliConfig::snapshot();

        let mut gateway = match &cli.config_file_location {
            Some(path) => GatewaySettings::from_file_async(path)
                .await
                .unwrap_or_else(|e| panic!("failed to load gateway config from {:?}: {e}", path)),
            None => GatewaySettings::default(),
        };

        apply_overrides(&mut gateway, &cli);

        let next = Config {
            gateway,
            log_level: cli.log_level,
        };

        if ROOT_CONFIG.set(Arc::new(RwLock::new(next))).is_err() {
            warn!("config already initialized; keeping the first one");
        }
    }

    fn handle() -> Arc<RwLock<Config>> {
        ROOT_CONFIG
            .get()
            .expect("Config not initialized; call Config::init().await first")
            .clone()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn apply_overrides(gateway: &mut GatewaySettings, cli: &CliConfig) {
    let ip = cli.host.unwrap_or(gateway.bind_addr.ip());
    let port = cli.port.unwrap_or(gateway.bind_addr.port());
    gateway.bind_addr = SocketAddr::new(ip, port);
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
