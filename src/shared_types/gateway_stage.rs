// -----------------------------------------------------------------------------
// ----- GatewayStage ----------------------------------------------------------

/// Coarse gateway state as seen by the host process.
///
/// While `Terminating` (and after), session loss never triggers a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStage {
    Running,
    Terminating,
    Terminated,
}
