use clap::Parser;
use parking_lot::RwLock;
use std::{
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use super::types::LogLevel;

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static CLI_CONFIG: OnceLock<Arc<RwLock<CliConfig>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CliConfig {
    pub config_file_location: Option<PathBuf>,
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub log_level: LogLevel,
}

impl CliConfig {
    pub fn init() {
        CLI_CONFIG.get_or_init(|| {
            let cfg = Self::from_args();
            cfg.validate();
            Arc::new(RwLock::new(cfg))
        });
    }

    pub fn snapshot() -> CliConfig {
        handle().read().clone()
    }
}

// -----------------------------------------------------------------------------
// ----- CliConfig: Private ----------------------------------------------------

impl CliConfig {
    fn from_args() -> Self {
        let args = Args::try_parse().unwrap_or_else(|e| panic!("Invalid CLI/ENV: {e}"));

        Self {
            config_file_location: args.config_file,
            host: args.host,
            port: args.port,
            log_level: args.log_level,
        }
    }

    fn validate(&self) {
        if let Some(path) = &self.config_file_location {
            must_exist_file(path, "--config / udpgate.toml");
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "udpgate", version, about = "UDP to pub/sub ingestion gateway")]
struct Args {
    // Gateway settings file (Port, IPAddr, ServerConnections, Endpoint, ...).
    // Optional; every setting has a default.
    #[arg(long = "config", env = "UDPGATE_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    // Overrides IPAddr from the file.
    #[arg(long = "host", short = 'H', env = "UDPGATE_HOST")]
    host: Option<IpAddr>,

    // Overrides Port from the file.
    #[arg(long = "port", short = 'p', env = "UDPGATE_PORT")]
    port: Option<u16>,

    #[arg(long = "log", env = "UDPGATE_LOG", default_value = "info")]
    log_level: LogLevel,
}

// -----------------------------------------------------------------------------
// ----- Private Utils ---------------------------------------------------------

fn handle() -> Arc<RwLock<CliConfig>> {
    CLI_CONFIG
        .get()
        .expect("config not initialized; call Config::init().await first")
        .clone()
}

fn must_exist_file(path: &Path, hint: &str) {
    let md = fs::metadata(path).unwrap_or_else(|_| {
        panic!("required file missing: {} (from {hint})", path.display());
    });

    if !md.is_file() {
        panic!("path is not a file: {} (from {hint})", path.display());
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
