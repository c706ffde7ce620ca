//! Server-side WebSocket endpoint library on top of an axum HTTP pipeline.
//!
//! Three pieces carry the weight:
//!
//! - [`FrameCodec`]: the RFC 6455 wire format as a [`tokio_util::codec`]
//!   codec; masked client frames in, single final unmasked frames out.
//! - The per-connection receive loop: reassembles fragmented messages,
//!   answers pings, and dispatches complete messages to a user-supplied
//!   [`MessageHandler`].
//! - [`ConnectionManager`]: the registry of live [`Connection`]s with
//!   text/binary broadcast under a readers-writer discipline.
//!
//! [`websocket_route`] ties them to axum: it validates the HTTP upgrade,
//! answers `101 Switching Protocols` with the derived
//! `Sec-WebSocket-Accept`, and registers the upgraded stream with the
//! manager.
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use websocket_hub::{websocket_route, ConnectionManager, MessageHandler, TextMessage};
//!
//! struct EchoHandler;
//!
//! #[async_trait]
//! impl MessageHandler for EchoHandler {
//!     async fn on_text_message(&self, msg: TextMessage) -> anyhow::Result<()> {
//!         msg.conn.send_text(&msg.text).await?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = Arc::new(ConnectionManager::new());
//!     let app = websocket_route("/ws", Arc::clone(&manager), Arc::new(EchoHandler));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod manager;
pub mod message;
mod receive;
pub mod upgrade;

pub use config::WsConfig;
pub use connection::Connection;
pub use error::WsError;
pub use frame::{apply_mask, CloseCode, Frame, FrameCodec, Opcode};
pub use manager::ConnectionManager;
pub use message::{BinaryMessage, CloseMessage, MessageHandler, TextMessage};
pub use upgrade::{
    derive_accept_key, validate_upgrade, websocket_route, websocket_route_with_config,
    UpgradeRejection, UpgradeRequest, WebSocketEndpoint,
};
