//! Error types for the WebSocket endpoint.

use crate::frame::Opcode;
use std::io;
use thiserror::Error;

/// Errors raised by the frame codec, connection operations, and the
/// per-connection receive loop.
///
/// Protocol violations terminate the offending connection only; I/O errors
/// do the same. `CloseReasonTooLong` is caller misuse and is surfaced
/// synchronously without touching the connection.
#[derive(Debug, Error)]
pub enum WsError {
    /// Stream read/write failure, including short reads and short writes.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Opcode value outside the RFC 6455 set.
    #[error("invalid opcode: 0x{0:X}")]
    InvalidOpcode(u8),

    /// One of the RSV1-3 bits was set; no extension is negotiated.
    #[error("reserved bits set without extension")]
    ReservedBits,

    /// Control frame declared a payload longer than 125 bytes.
    #[error("control frame payload too large: {0} bytes (max 125)")]
    ControlFrameTooLarge(usize),

    /// Control frame arrived with FIN clear.
    #[error("control frame cannot be fragmented")]
    FragmentedControlFrame,

    /// A data frame interrupted an in-progress fragmented message.
    #[error("expected continuation frame, got {0:?}")]
    ExpectedContinuation(Opcode),

    /// Frame or reassembled message exceeds the configured size limit.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: u64, max: usize },

    /// Text message payload is not valid UTF-8.
    #[error("invalid UTF-8 in text message")]
    InvalidUtf8,

    /// Close reason exceeds the 123 bytes that fit in a control payload
    /// alongside the two status-code bytes.
    #[error("close reason too long: {0} bytes (max 123)")]
    CloseReasonTooLong(usize),

    /// Send attempted after the connection was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

impl WsError {
    /// True for peer-side protocol violations, as opposed to transport
    /// failures or local misuse.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::InvalidOpcode(_)
                | Self::ReservedBits
                | Self::ControlFrameTooLarge(_)
                | Self::FragmentedControlFrame
                | Self::ExpectedContinuation(_)
                | Self::PayloadTooLarge { .. }
                | Self::InvalidUtf8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_classification() {
        assert!(WsError::ReservedBits.is_protocol());
        assert!(WsError::InvalidOpcode(0x3).is_protocol());
        assert!(WsError::ControlFrameTooLarge(200).is_protocol());
        assert!(WsError::InvalidUtf8.is_protocol());
        assert!(!WsError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe")).is_protocol());
        assert!(!WsError::CloseReasonTooLong(200).is_protocol());
        assert!(!WsError::ConnectionClosed.is_protocol());
    }

    #[test]
    fn display_carries_detail() {
        let err = WsError::InvalidOpcode(0x0F);
        assert!(err.to_string().contains("0xF"));

        let err = WsError::PayloadTooLarge {
            size: 10_000,
            max: 1024,
        };
        assert!(err.to_string().contains("10000"));
        assert!(err.to_string().contains("1024"));

        let err = WsError::CloseReasonTooLong(150);
        assert!(err.to_string().contains("150"));
    }
}
