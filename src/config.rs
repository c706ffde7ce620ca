//! Endpoint configuration.

use crate::frame::FrameCodec;

/// Size limits applied to every connection of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsConfig {
    /// Maximum payload of a single frame. Larger frames terminate the
    /// connection with a protocol error.
    pub max_frame_size: usize,
    /// Maximum size of a reassembled fragmented message.
    pub max_message_size: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: FrameCodec::DEFAULT_MAX_FRAME_SIZE,
            max_message_size: 64 * 1024 * 1024,
        }
    }
}

impl WsConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum single-frame payload size.
    #[must_use]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Sets the maximum reassembled message size.
    #[must_use]
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}
