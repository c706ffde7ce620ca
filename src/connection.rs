//! A single live WebSocket connection.

use crate::config::WsConfig;
use crate::error::WsError;
use crate::frame::{CloseCode, Frame, FrameCodec};
use crate::message::MessageHandler;
use bytes::Bytes;
use futures_util::SinkExt;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};
use uuid::Uuid;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub(crate) type FrameReader = FramedRead<BoxedReader, FrameCodec>;

/// One upgraded WebSocket connection.
///
/// The output stream is shared between the receive loop (pong replies, the
/// closing frame) and any number of senders, broadcasts included; writes
/// serialize on a per-connection mutex around the write half, so each frame
/// is emitted atomically from the caller's perspective.
///
/// The read half is claimed exactly once by the connection's receive loop.
pub struct Connection {
    id: Uuid,
    reader: parking_lot::Mutex<Option<FrameReader>>,
    writer: Mutex<FramedWrite<BoxedWriter, FrameCodec>>,
    handler: Arc<dyn MessageHandler>,
    config: WsConfig,
    closed: AtomicBool,
}

impl Connection {
    /// Wraps the two halves of an upgraded byte stream.
    ///
    /// The connection gets a fresh v4 UUID as its identity.
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
        handler: Arc<dyn MessageHandler>,
        config: WsConfig,
    ) -> Self {
        let codec = FrameCodec::new().max_frame_size(config.max_frame_size);
        Self {
            id: Uuid::new_v4(),
            reader: parking_lot::Mutex::new(Some(FramedRead::new(
                Box::new(reader) as BoxedReader,
                codec,
            ))),
            writer: Mutex::new(FramedWrite::new(
                Box::new(writer) as BoxedWriter,
                FrameCodec::new(),
            )),
            handler,
            config,
            closed: AtomicBool::new(false),
        }
    }

    /// Connection identity, unique across all live connections in the
    /// process. Assigned at construction and never changes.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn handler(&self) -> &Arc<dyn MessageHandler> {
        &self.handler
    }

    pub(crate) fn config(&self) -> WsConfig {
        self.config
    }

    /// Hands the read half to the receive loop. Returns `None` on any call
    /// after the first.
    pub(crate) fn take_reader(&self) -> Option<FrameReader> {
        self.reader.lock().take()
    }

    /// Sends a single final text frame.
    pub async fn send_text(&self, text: &str) -> Result<(), WsError> {
        self.send_frame(Frame::text(text)).await
    }

    /// Sends a single final binary frame.
    pub async fn send_binary(&self, data: &[u8]) -> Result<(), WsError> {
        self.send_frame(Frame::binary(data.to_vec())).await
    }

    /// Sends a close frame without shutting the streams down.
    ///
    /// Fails with [`WsError::CloseReasonTooLong`] when `reason` exceeds 123
    /// bytes.
    pub async fn send_close(&self, code: CloseCode, reason: &str) -> Result<(), WsError> {
        let frame = Frame::close(code, reason)?;
        self.send_frame(frame).await
    }

    pub(crate) async fn send_pong(&self, payload: Bytes) -> Result<(), WsError> {
        self.send_frame(Frame::pong(payload)).await
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), WsError> {
        if self.is_closed() {
            return Err(WsError::ConnectionClosed);
        }
        let mut writer = self.writer.lock().await;
        writer.send(frame).await
    }

    /// Shuts the connection down.
    ///
    /// Idempotent: only the first call has any effect. Sends a best-effort
    /// `Close(1000)` frame, shuts the write half down, releases the read
    /// half if the receive loop never claimed it, and finally notifies the
    /// handler via `on_connection_closed`. Safe to invoke concurrently with
    /// in-flight sends.
    pub async fn close(self: &Arc<Self>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut writer = self.writer.lock().await;
            if let Ok(frame) = Frame::close(CloseCode::Normal, "") {
                if let Err(e) = writer.send(frame).await {
                    warn!(conn_id = %self.id, error = %e, "failed to send closing frame");
                }
            }
            if let Err(e) = writer.get_mut().shutdown().await {
                debug!(conn_id = %self.id, error = %e, "error shutting down output stream");
            }
        }
        drop(self.reader.lock().take());

        self.handler.on_connection_closed(Arc::clone(self)).await;
        debug!(conn_id = %self.id, "connection closed");
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
