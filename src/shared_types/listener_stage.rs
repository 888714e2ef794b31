/// Lifecycle of the UDP ingest listener.
///
/// `Idle -> Listening -> Draining -> Stopped`. There is no way back; a stopped
/// listener is dropped and a new one created if the gateway restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStage {
    /// Constructed, socket not bound yet.
    Idle,

    /// Receive loop running.
    Listening,

    /// Stop requested; waiting for the receive loop to finish its current datagram.
    Draining,

    /// Receive loop exited.
    Stopped,
}
