pub mod gateway_stage;
pub mod listener_stage;
pub mod reason_code;
pub mod session_kind;

pub use gateway_stage::GatewayStage;
pub use listener_stage::ListenerStage;
pub use reason_code::ReasonCode;
pub use session_kind::SessionKind;
