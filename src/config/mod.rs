pub mod cli;
#[allow(clippy::module_inception)]
pub mod config;
pub mod gateway;
pub mod types;

pub use config::Config;
pub use gateway::{GatewayConfigError, GatewaySettings};
pub use types::LogLevel;
