//! Module: wire
//!
//! Text framing for the UDP side of the gateway.
//!
//! - `InboundFrame`: `MSG:<seq>:<topic>:<body>`, sent by UDP clients.
//! - `OutboundAck`: `ACK:<seq>:<rc>[:<reason>]`, sent back once a publish completes.
//!
//! Everything in here is pure and stateless; safe to call from any thread.

pub mod error;
pub mod inbound;
pub mod outbound;

pub use error::FrameError;
pub use inbound::InboundFrame;
pub use outbound::OutboundAck;

/// Field separator shared by both frame kinds.
pub(crate) const SEPARATOR: u8 = b':';
