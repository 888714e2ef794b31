//! Module: wire::outbound
//!
//! `ACK:<seq>:<rc>[:<reason>]`
//!
//! The reason is written verbatim; a ':' inside it is not escaped. Peers that
//! split on ':' must treat everything after the result code as the reason.

use bytes::{BufMut, Bytes, BytesMut};

use super::{FrameError, SEPARATOR, inbound::split_sequence};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const PREFIX: &[u8] = b"ACK:";

// -----------------------------------------------------------------------------
// ----- OutboundAck -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundAck {
    pub sequence_id: u32,
    pub result_code: i32,
    pub reason: Option<String>,
}

// -----------------------------------------------------------------------------
// ----- OutboundAck: Static ---------------------------------------------------

impl OutboundAck {
    pub fn new(sequence_id: u32, result_code: i32, reason: Option<String>) -> Self {
        Self {
            sequence_id,
            result_code,
            reason,
        }
    }

    /// Client-side decoder. An empty reason decodes to `None`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, FrameError> {
        let rest = buf
            .strip_prefix(PREFIX)
            .ok_or(FrameError::MissingPrefix { expected: "ACK:" })?;

        let (sequence_id, rest) = split_sequence(rest)?;

        let code_end = memchr::memchr(SEPARATOR, rest).unwrap_or(rest.len());
        let code = &rest[..code_end];

        let digits = code.strip_prefix(b"-").unwrap_or(code);
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(FrameError::MissingDigits { field: "result_code" });
        }

        // Only ASCII digits and an optional '-' reach this point.
        let result_code = std::str::from_utf8(code)
            .ok()
            .and_then(|s| s.parse::<i32>().ok())
            .ok_or(FrameError::ResultCodeOutOfRange)?;

        let reason = match rest.get(code_end + 1..) {
            Some(r) if !r.is_empty() => Some(
                std::str::from_utf8(r)
                    .map_err(|_| FrameError::InvalidReason)?
                    .to_owned(),
            ),
            _ => None,
        };

        Ok(Self {
            sequence_id,
            result_code,
            reason,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- OutboundAck: Public ---------------------------------------------------

impl OutboundAck {
    pub fn to_bytes(&self) -> Bytes {
        let seq = self.sequence_id.to_string();
        let code = self.result_code.to_string();
        let reason = self.reason.as_deref().filter(|r| !r.is_empty());

        let mut buf = BytesMut::with_capacity(
            PREFIX.len() + seq.len() + code.len() + 2 + reason.map_or(0, str::len),
        );

        buf.put_slice(PREFIX);
        buf.put_slice(seq.as_bytes());
        buf.put_u8(SEPARATOR);
        buf.put_slice(code.as_bytes());

        if let Some(reason) = reason {
            buf.put_u8(SEPARATOR);
            buf.put_slice(reason.as_bytes());
        }

        buf.freeze()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_without_reason() {
        let ack = OutboundAck::new(7, 0, None);
        assert_eq!(&ack.to_bytes()[..], b"ACK:7:0");
    }

    #[test]
    fn empty_reason_is_omitted() {
        let ack = OutboundAck::new(7, 0, Some(String::new()));
        assert_eq!(&ack.to_bytes()[..], b"ACK:7:0");
    }

    #[test]
    fn encodes_reason() {
        let ack = OutboundAck::new(9, 160, Some("not authorized".into()));
        assert_eq!(&ack.to_bytes()[..], b"ACK:9:160:not authorized");
    }

    #[test]
    fn reason_separator_is_not_escaped() {
        let ack = OutboundAck::new(1, 2, Some("a:b".into()));
        assert_eq!(&ack.to_bytes()[..], b"ACK:1:2:a:b");
    }

    #[test]
    fn decodes_what_it_encodes() {
        let acks = [
            OutboundAck::new(7, 0, None),
            OutboundAck::new(u32::MAX, 113, Some("destination full".into())),
            OutboundAck::new(3, -1, None),
        ];

        for ack in acks {
            assert_eq!(OutboundAck::from_bytes(&ack.to_bytes()).unwrap(), ack);
        }
    }

    #[test]
    fn rejects_malformed_acks() {
        assert!(matches!(
            OutboundAck::from_bytes(b"MSG:1:0"),
            Err(FrameError::MissingPrefix { .. })
        ));
        assert!(matches!(
            OutboundAck::from_bytes(b"ACK:1:"),
            Err(FrameError::MissingDigits { field: "result_code" })
        ));
        assert!(matches!(
            OutboundAck::from_bytes(b"ACK:1"),
            Err(FrameError::MissingSeparator { field: "sequence" })
        ));
        assert!(matches!(
            OutboundAck::from_bytes(b"ACK:1:99999999999"),
            Err(FrameError::ResultCodeOutOfRange)
        ));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
