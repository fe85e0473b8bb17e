//! Protocol-level errors
//!
//! Every variant here is connection-fatal: a peer that cannot frame or
//! encode envelopes correctly cannot be trusted to stay in sync, so the
//! connection is closed rather than answered with a fault.

use thiserror::Error;

/// Errors raised by the frame codec and the handshake.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed envelope: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Unsupported protocol version {found}, this daemon speaks {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Expected a hello envelope to open the connection, got {got}")]
    HandshakeExpected { got: String },

    #[error("Unexpected {got} envelope from client")]
    UnexpectedMessage { got: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_too_large_displays_sizes() {
        let err = ProtocolError::FrameTooLarge {
            size: 5000,
            limit: 4096,
        };
        assert!(err.to_string().contains("5000"));
        assert!(err.to_string().contains("4096"));
    }

    #[test]
    fn unsupported_version_displays_both_versions() {
        let err = ProtocolError::UnsupportedVersion {
            found: 9,
            supported: 1,
        };
        assert!(err.to_string().contains("9"));
        assert!(err.to_string().contains("1"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: ProtocolError = io.into();
        assert!(matches!(err, ProtocolError::Io(_)));
    }
}
