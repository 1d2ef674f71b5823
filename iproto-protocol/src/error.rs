//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing, handshake or decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("response has invalid size")]
    InvalidSize,

    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    #[error("unexpected {what} type: expected {expected}")]
    UnexpectedType {
        what: &'static str,
        expected: &'static str,
    },

    #[error("request id mismatch: sent {expected}, received {actual}")]
    IdMismatch { expected: u64, actual: u64 },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u64, max: u32 },

    #[error("invalid greeting: {0}")]
    InvalidGreeting(String),

    #[error("cannot xor buffers of different lengths: {left} and {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("unknown call semantics: {0} (expected 'old' or 'new')")]
    UnknownCallSemantics(String),

    #[error("msgpack encode error: {0}")]
    Encode(String),

    #[error("msgpack decode error: {0}")]
    Decode(String),
}

impl ProtocolError {
    /// Returns whether the stream is desynchronized after this error.
    ///
    /// Only configuration-like errors leave the connection usable.
    pub fn is_desync(&self) -> bool {
        !matches!(
            self,
            ProtocolError::UnknownCallSemantics(_)
                | ProtocolError::LengthMismatch { .. }
                | ProtocolError::Encode(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::IdMismatch {
            expected: 7,
            actual: 9,
        };
        let msg = err.to_string();
        assert!(msg.contains("mismatch"));
        assert!(msg.contains('7'));
        assert!(msg.contains('9'));

        let err = ProtocolError::InvalidSize;
        assert_eq!(err.to_string(), "response has invalid size");

        let err = ProtocolError::InvalidHeader("not a map");
        assert!(err.to_string().contains("invalid header"));

        let err = ProtocolError::LengthMismatch { left: 20, right: 19 };
        assert!(err.to_string().contains("20"));

        let err = ProtocolError::UnknownCallSemantics("sideways".to_string());
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn test_desync_classification() {
        assert!(ProtocolError::InvalidSize.is_desync());
        assert!(ProtocolError::IdMismatch {
            expected: 1,
            actual: 2
        }
        .is_desync());
        assert!(!ProtocolError::UnknownCallSemantics("x".into()).is_desync());
        assert!(!ProtocolError::Encode("x".into()).is_desync());
    }
}
