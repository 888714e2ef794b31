pub mod config;
pub mod errors;
pub mod gateway;
pub mod shared_types;
pub mod upstream;
pub mod wire;

pub use config::{Config, GatewaySettings};
pub use errors::GatewayError;
pub use gateway::Gateway;
pub use upstream::{LoopbackConnector, SessionConnector, UpstreamSession};
