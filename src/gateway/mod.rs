//! Gateway orchestration: pool, correlation, listener, lifecycle.
//! Wire framing lives in `wire`; the broker boundary in `upstream`.

pub mod ack_writer;
pub mod correlation;
pub mod lifecycle;
pub mod listener;
pub mod pool;
pub mod repair;
pub mod stats;

pub use ack_writer::AckSink;
pub use correlation::CorrelationToken;
pub use lifecycle::Gateway;
pub use listener::{Dispatch, Dispatcher, IngestListener, ListenerSettings};
pub use pool::{ConnectionPool, PoolStats, RepairCause, RepairRequest, SlotState};
pub use stats::{GatewayStats, StatsSnapshot};
