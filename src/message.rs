//! Application-level messages and the user handler capability.

use crate::connection::Connection;
use crate::upgrade::UpgradeRequest;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// A complete text message, reassembled and UTF-8 validated.
#[derive(Debug, Clone)]
pub struct TextMessage {
    /// Connection the message arrived on.
    pub conn: Arc<Connection>,
    /// Decoded message text.
    pub text: String,
}

/// A complete binary message.
#[derive(Debug, Clone)]
pub struct BinaryMessage {
    /// Connection the message arrived on.
    pub conn: Arc<Connection>,
    /// Message payload.
    pub data: Bytes,
}

/// A close frame received from the peer.
#[derive(Debug, Clone)]
pub struct CloseMessage {
    /// Connection the close arrived on.
    pub conn: Arc<Connection>,
    /// Status code from the close payload; 1005 when the payload was empty.
    pub code: u16,
    /// Optional close reason.
    pub reason: Option<String>,
}

/// User-supplied message handler.
///
/// One handler instance serves every connection it is bound to, so it must
/// be shareable; per-connection state belongs in your own keyed structures,
/// indexed by [`Connection::id`]. Every hook has a no-op default, so an
/// implementation only overrides what it cares about.
///
/// Errors returned from the fallible hooks are logged and terminate the
/// originating connection.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use websocket_hub::{MessageHandler, TextMessage};
///
/// struct EchoHandler;
///
/// #[async_trait]
/// impl MessageHandler for EchoHandler {
///     async fn on_text_message(&self, msg: TextMessage) -> anyhow::Result<()> {
///         msg.conn.send_text(&format!("Echo: {}", msg.text)).await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Called after the connection is registered and its receive loop is
    /// running. `request` is a snapshot of the upgrade request.
    async fn on_connection_established(
        &self,
        conn: Arc<Connection>,
        request: &UpgradeRequest,
    ) -> Result<()> {
        let _ = (conn, request);
        Ok(())
    }

    /// Called for every complete text message.
    async fn on_text_message(&self, message: TextMessage) -> Result<()> {
        let _ = message;
        Ok(())
    }

    /// Called for every complete binary message.
    async fn on_binary_message(&self, message: BinaryMessage) -> Result<()> {
        let _ = message;
        Ok(())
    }

    /// Called when the peer sends a close frame, before the connection is
    /// removed from the manager.
    async fn on_close_message(&self, message: CloseMessage) -> Result<()> {
        let _ = message;
        Ok(())
    }

    /// Called exactly once when the connection shuts down, whatever the
    /// cause.
    async fn on_connection_closed(&self, conn: Arc<Connection>) {
        let _ = conn;
    }
}
