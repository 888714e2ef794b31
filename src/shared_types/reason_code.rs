use std::fmt;

// -----------------------------------------------------------------------------
// ----- ReasonCode ------------------------------------------------------------

/// Why an upstream session went away (or never came up).
///
/// Only `ServerTerminating` and `EndpointDisabled` are final: the broker is
/// going down or the endpoint was switched off, so asking for a replacement
/// would just fail again. Everything else is repaired by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    /// Transport-level failure on an established session.
    ConnectionError,

    /// Session creation never completed.
    ConnectFailed,

    /// The broker closed the session without a more specific reason.
    Closed,

    /// The broker itself is shutting down.
    ServerTerminating,

    /// The endpoint this gateway publishes through was disabled.
    EndpointDisabled,

    /// Broker-specific code with no mapping here.
    Other(i32),
}

impl ReasonCode {
    pub fn allows_reconnect(self) -> bool {
        !matches!(self, ReasonCode::ServerTerminating | ReasonCode::EndpointDisabled)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasonCode::ConnectionError => f.write_str("connection error"),
            ReasonCode::ConnectFailed => f.write_str("connect failed"),
            ReasonCode::Closed => f.write_str("closed"),
            ReasonCode::ServerTerminating => f.write_str("server terminating"),
            ReasonCode::EndpointDisabled => f.write_str("endpoint disabled"),
            ReasonCode::Other(code) => write!(f, "reason code {code}"),
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
