use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use udpgate::{Config, Gateway, LoopbackConnector};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "udpgate";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> std::process::ExitCode {
    setup().await;

    match run_until_signal().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{APP_NAME} failed to start: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

async fn setup() {
    // This has to be the first thing we do, because it initializes the config
    Config::init().await;

    init_tracing();
}

fn init_tracing() {
    let config = Config::snapshot();
    let filter = EnvFilter::try_new(config.log_level.as_str())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run_until_signal() -> Result<(), udpgate::GatewayError> {
    let config = Config::snapshot();

    // No broker client is linked in; publishes are completed in-process.
    let connector = Arc::new(LoopbackConnector::new());

    let mut gateway = Gateway::on_start_messaging(config.gateway, connector).await?;
    info!("{} listening on {}", APP_NAME, gateway.local_addr());

    if let Err(e) = signal::ctrl_c().await {
        error!("failed to wait for shutdown signal: {e}");
    }

    gateway.on_terminate("shutdown signal").await;
    Ok(())
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
