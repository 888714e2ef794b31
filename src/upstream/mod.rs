//! Upstream broker boundary.
//!
//! The gateway does not speak to a broker directly. A `SessionConnector`
//! creates sessions asynchronously and reports back through `SessionEvents`;
//! an `UpstreamSession` accepts publishes and reports their outcome through a
//! `Completion`. `loopback` is an in-process connector for running without a
//! broker and for tests.

pub mod completion;
pub mod connector;
pub mod loopback;
pub mod session;

pub use completion::{Completion, PublishContext, PublishOutcome};
pub use connector::{SessionConnector, SessionEvents, SessionRequest};
pub use loopback::LoopbackConnector;
pub use session::UpstreamSession;
