//! wire::error.rs
//!
//! Parse errors for both frame kinds.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("missing '{expected}' prefix")]
    MissingPrefix { expected: &'static str },

    #[error("missing digits for field '{field}'")]
    MissingDigits { field: &'static str },

    #[error("missing ':' after field '{field}'")]
    MissingSeparator { field: &'static str },

    #[error("empty topic")]
    EmptyTopic,

    #[error("topic is not valid UTF-8")]
    InvalidTopic,

    #[error("reason is not valid UTF-8")]
    InvalidReason,

    #[error("result code out of range")]
    ResultCodeOutOfRange,
}
