//! Protocol error types for the socket layer.

use std::io;

use thiserror::Error;

/// Maximum frame size in bytes (64 KiB).
///
/// Checked against the length prefix before any payload is buffered.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Errors of the framing, serialization and transport layers.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds [`MAX_FRAME_SIZE`].
    #[error("frame too large: {size} bytes exceeds maximum {max} bytes")]
    FrameTooLarge {
        /// Size announced by the length prefix, or of the outgoing payload.
        size: usize,
        /// Maximum allowed frame size.
        max: usize,
    },

    /// The peer closed the connection before a response arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// Peer credentials could not be read from the socket.
    #[error("peer credentials unavailable: {0}")]
    PeerCredentials(#[source] io::Error),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Payload could not be serialized or deserialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the failure.
        reason: String,
    },
}

impl ProtocolError {
    /// Create a frame too large error.
    #[must_use]
    pub const fn frame_too_large(size: usize, max: usize) -> Self {
        Self::FrameTooLarge { size, max }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_too_large_message() {
        let err = ProtocolError::frame_too_large(70_000, MAX_FRAME_SIZE);
        assert_eq!(
            err.to_string(),
            "frame too large: 70000 bytes exceeds maximum 65536 bytes"
        );
    }

    #[test]
    fn json_errors_become_serialization_errors() {
        let err: ProtocolError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, ProtocolError::Serialization { .. }));
    }
}
