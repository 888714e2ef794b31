// -----------------------------------------------------------------------------
// ----- SessionKind -----------------------------------------------------------

/// Kind of upstream session the gateway asks the broker for.
///
/// The gateway only ever publishes, so this is a single variant today; it is
/// passed through so connectors can tell gateway sessions from their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Publisher,
}
