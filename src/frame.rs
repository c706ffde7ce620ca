//! RFC 6455 frame codec.
//!
//! Wire layout (RFC 6455 §5.2): byte 0 carries FIN, three reserved bits and
//! the opcode; byte 1 carries the MASK bit and a 7-bit length that escapes
//! to a 16-bit (`126`) or 64-bit (`127`) big-endian extended length. A
//! 4-byte masking key follows when MASK is set, then the payload, XOR-masked
//! with `key[i % 4]` on the client-to-server direction.
//!
//! The codec plugs into [`tokio_util::codec`]: the decoder consumes one
//! complete frame at a time from a [`BytesMut`] read buffer and hands back
//! the payload already unmasked; the encoder always emits single, final,
//! unmasked frames (the server-to-client form). Outgoing messages are never
//! fragmented.

use crate::error::WsError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Frame opcode (4 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Subsequent fragment of a fragmented message.
    Continuation = 0x0,
    /// Text data frame.
    Text = 0x1,
    /// Binary data frame.
    Binary = 0x2,
    /// Connection close control frame.
    Close = 0x8,
    /// Ping control frame.
    Ping = 0x9,
    /// Pong control frame.
    Pong = 0xA,
}

impl Opcode {
    /// Returns true for Close, Ping and Pong.
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }

    /// Parse an opcode from its wire value.
    pub fn from_u8(value: u8) -> Result<Self, WsError> {
        match value {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            _ => Err(WsError::InvalidOpcode(value)),
        }
    }
}

/// Close status codes from RFC 6455 §7.4.
///
/// `NoCode`, `ClosedAbnormally` and `TlsHandshakeFailure` are reserved for
/// local signalling and never appear on the wire; see
/// [`CloseCode::is_sendable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CloseCode {
    /// Normal closure (1000).
    Normal = 1000,
    /// Endpoint is going away (1001).
    GoingAway = 1001,
    /// Protocol error (1002).
    ProtocolError = 1002,
    /// Data type the endpoint cannot accept (1003).
    UnacceptableData = 1003,
    /// No status code was present (1005, local only).
    NoCode = 1005,
    /// Connection dropped without a close frame (1006, local only).
    ClosedAbnormally = 1006,
    /// Payload inconsistent with the message type (1007).
    InconsistentData = 1007,
    /// Message violates the endpoint policy (1008).
    PolicyViolation = 1008,
    /// Message too big to process (1009).
    MessageTooBig = 1009,
    /// Client expected an extension the server did not negotiate (1010).
    ExtensionNegotiationFailure = 1010,
    /// Server hit an unexpected condition (1011).
    UnexpectedCondition = 1011,
    /// TLS handshake failure (1015, local only).
    TlsHandshakeFailure = 1015,
}

impl CloseCode {
    /// Whether this code may be carried in a close frame.
    #[must_use]
    pub const fn is_sendable(self) -> bool {
        !matches!(
            self,
            Self::NoCode | Self::ClosedAbnormally | Self::TlsHandshakeFailure
        )
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code as Self
    }
}

impl TryFrom<u16> for CloseCode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, u16> {
        match value {
            1000 => Ok(Self::Normal),
            1001 => Ok(Self::GoingAway),
            1002 => Ok(Self::ProtocolError),
            1003 => Ok(Self::UnacceptableData),
            1005 => Ok(Self::NoCode),
            1006 => Ok(Self::ClosedAbnormally),
            1007 => Ok(Self::InconsistentData),
            1008 => Ok(Self::PolicyViolation),
            1009 => Ok(Self::MessageTooBig),
            1010 => Ok(Self::ExtensionNegotiationFailure),
            1011 => Ok(Self::UnexpectedCondition),
            1015 => Ok(Self::TlsHandshakeFailure),
            other => Err(other),
        }
    }
}

/// One parsed WebSocket frame. The payload is already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// FIN bit: final fragment of the message.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: Opcode,
    /// Payload data, unmasked.
    pub payload: Bytes,
}

impl Frame {
    /// Single final text frame carrying the UTF-8 bytes of `text`.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            fin: true,
            opcode: Opcode::Text,
            payload: Bytes::from(text.into()),
        }
    }

    /// Single final binary frame.
    #[must_use]
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode: Opcode::Binary,
            payload: payload.into(),
        }
    }

    /// Ping frame with the given payload.
    #[must_use]
    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode: Opcode::Ping,
            payload: payload.into(),
        }
    }

    /// Pong frame with the given payload.
    #[must_use]
    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode: Opcode::Pong,
            payload: payload.into(),
        }
    }

    /// Close frame: 2-byte big-endian status code followed by the UTF-8
    /// reason. The reason must be at most 123 bytes so the control payload
    /// stays within 125.
    pub fn close(code: CloseCode, reason: &str) -> Result<Self, WsError> {
        if reason.len() > 123 {
            return Err(WsError::CloseReasonTooLong(reason.len()));
        }
        let mut payload = BytesMut::with_capacity(2 + reason.len());
        payload.put_u16(u16::from(code));
        payload.put_slice(reason.as_bytes());
        Ok(Self {
            fin: true,
            opcode: Opcode::Close,
            payload: payload.freeze(),
        })
    }
}

/// XOR the payload with `key[i % 4]`, in place.
///
/// Masking is an involution: applying the same key twice restores the
/// original bytes.
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Frame codec for server-side use.
///
/// Decoding is permissive toward the MASK bit: masked client frames are
/// unmasked, unmasked ones are passed through. Encoding never masks and
/// never fragments.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Default cap on a single frame payload (16 MiB).
    pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

    #[must_use]
    pub fn new() -> Self {
        Self {
            max_frame_size: Self::DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Sets the maximum accepted frame payload size.
    #[must_use]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = WsError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, WsError> {
        if src.len() < 2 {
            return Ok(None);
        }

        let first = src[0];
        let second = src[1];

        if first & 0x70 != 0 {
            return Err(WsError::ReservedBits);
        }
        let fin = first & 0x80 != 0;
        let opcode = Opcode::from_u8(first & 0x0F)?;
        let masked = second & 0x80 != 0;
        let len7 = second & 0x7F;

        if opcode.is_control() {
            if !fin {
                return Err(WsError::FragmentedControlFrame);
            }
            if len7 > 125 {
                return Err(WsError::ControlFrameTooLarge(len7 as usize));
            }
        }

        let (length_field, payload_len) = match len7 {
            126 => {
                if src.len() < 4 {
                    return Ok(None);
                }
                (2, u64::from(u16::from_be_bytes([src[2], src[3]])))
            }
            127 => {
                if src.len() < 10 {
                    return Ok(None);
                }
                let mut be = [0u8; 8];
                be.copy_from_slice(&src[2..10]);
                (8, u64::from_be_bytes(be))
            }
            n => (0, u64::from(n)),
        };

        if payload_len > self.max_frame_size as u64 {
            return Err(WsError::PayloadTooLarge {
                size: payload_len,
                max: self.max_frame_size,
            });
        }

        let mask_len = if masked { 4 } else { 0 };
        let total = 2 + length_field + mask_len + payload_len as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(2 + length_field);
        let mask_key = if masked {
            let key_bytes = src.split_to(4);
            let mut key = [0u8; 4];
            key.copy_from_slice(&key_bytes);
            Some(key)
        } else {
            None
        };

        let mut payload = src.split_to(payload_len as usize);
        if let Some(key) = mask_key {
            apply_mask(&mut payload, key);
        }

        Ok(Some(Frame {
            fin,
            opcode,
            payload: payload.freeze(),
        }))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, WsError> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(WsError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended mid-frame with {} buffered bytes", buf.len()),
            ))),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = WsError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), WsError> {
        let payload_len = frame.payload.len();

        if frame.opcode.is_control() {
            if !frame.fin {
                return Err(WsError::FragmentedControlFrame);
            }
            if payload_len > 125 {
                return Err(WsError::ControlFrameTooLarge(payload_len));
            }
        }

        let header_len = 2 + if payload_len > 0xFFFF {
            8
        } else if payload_len > 125 {
            2
        } else {
            0
        };
        dst.reserve(header_len + payload_len);

        let mut first = frame.opcode as u8;
        if frame.fin {
            first |= 0x80;
        }
        dst.put_u8(first);

        if payload_len <= 125 {
            dst.put_u8(payload_len as u8);
        } else if payload_len <= 0xFFFF {
            dst.put_u8(126);
            dst.put_u16(payload_len as u16);
        } else {
            dst.put_u8(127);
            dst.put_u64(payload_len as u64);
        }

        dst.put_slice(&frame.payload);
        Ok(())
    }
}
