//! Module: wire::inbound
//!
//! `MSG:<seq>:<topic>:<body>`
//!
//! - `<seq>`: one or more ASCII digits. `0` means fire-and-forget (no ACK).
//! - `<topic>`: non-empty, no ':'.
//! - `<body>`: rest of the datagram verbatim. May be empty, may contain ':'.
//!
//! No partial recovery: any deviation from the grammar is a `FrameError`.

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use super::{FrameError, SEPARATOR};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const PREFIX: &[u8] = b"MSG:";

// -----------------------------------------------------------------------------
// ----- InboundFrame ----------------------------------------------------------

#[derive(Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub sequence_id: u32,
    pub topic: String,
    pub payload: Bytes,
}

// -----------------------------------------------------------------------------
// ----- InboundFrame: Static --------------------------------------------------

impl InboundFrame {
    pub fn new(sequence_id: u32, topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence_id,
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, FrameError> {
        let rest = buf
            .strip_prefix(PREFIX)
            .ok_or(FrameError::MissingPrefix { expected: "MSG:" })?;

        let (sequence_id, rest) = split_sequence(rest)?;

        let topic_end =
            memchr::memchr(SEPARATOR, rest).ok_or(FrameError::MissingSeparator { field: "topic" })?;
        if topic_end == 0 {
            return Err(FrameError::EmptyTopic);
        }

        let topic = std::str::from_utf8(&rest[..topic_end]).map_err(|_| FrameError::InvalidTopic)?;
        let payload = Bytes::copy_from_slice(&rest[topic_end + 1..]);

        Ok(Self {
            sequence_id,
            topic: topic.to_owned(),
            payload,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- InboundFrame: Public --------------------------------------------------

impl InboundFrame {
    /// Sequence id 0 is reserved for "no acknowledgment requested".
    #[inline]
    pub fn wants_ack(&self) -> bool {
        self.sequence_id != 0
    }

    /// Client-side encoder. The gateway itself never sends `MSG:` frames.
    pub fn to_bytes(&self) -> Bytes {
        let seq = self.sequence_id.to_string();
        let mut buf =
            BytesMut::with_capacity(PREFIX.len() + seq.len() + self.topic.len() + self.payload.len() + 2);

        buf.put_slice(PREFIX);
        buf.put_slice(seq.as_bytes());
        buf.put_u8(SEPARATOR);
        buf.put_slice(self.topic.as_bytes());
        buf.put_u8(SEPARATOR);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

impl fmt::Debug for InboundFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundFrame")
            .field("sequence_id", &self.sequence_id)
            .field("topic", &self.topic)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

/// Reads the digit run and the ':' that closes it. Overflow wraps.
pub(super) fn split_sequence(buf: &[u8]) -> Result<(u32, &[u8]), FrameError> {
    let digits = buf.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Err(FrameError::MissingDigits { field: "sequence" });
    }

    if buf.get(digits) != Some(&SEPARATOR) {
        return Err(FrameError::MissingSeparator { field: "sequence" });
    }

    let value = buf[..digits]
        .iter()
        .fold(0u32, |acc, b| acc.wrapping_mul(10).wrapping_add(u32::from(b - b'0')));

    Ok((value, &buf[digits + 1..]))
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
