//! Per-connection receive loop: frame pump, fragment reassembly, control
//! frame handling and dispatch to the user handler.

use crate::connection::Connection;
use crate::error::WsError;
use crate::frame::{CloseCode, Opcode};
use crate::manager::ConnectionManager;
use crate::message::{BinaryMessage, CloseMessage, TextMessage};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

/// Reassembly state across frames of one connection.
enum Assembly {
    /// Between messages.
    Idle,
    /// Mid-way through a fragmented message.
    Assembling { is_text: bool, buffer: BytesMut },
}

/// Spawns the receive loop task for a registered connection.
///
/// The loop runs until a close frame, end of stream, a protocol violation,
/// or an I/O failure; whichever way it ends, the connection is removed from
/// the manager exactly once.
pub(crate) fn spawn_receive_loop(
    manager: Arc<ConnectionManager>,
    conn: Arc<Connection>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match run(&conn).await {
            Ok(()) => debug!(conn_id = %conn.id(), "receive loop finished"),
            Err(e) if e.is_protocol() => {
                warn!(conn_id = %conn.id(), error = %e, "protocol violation, dropping connection");
            }
            Err(e) => {
                error!(conn_id = %conn.id(), error = %e, "receive loop failed");
            }
        }
        manager.remove(&conn).await;
    })
}

async fn run(conn: &Arc<Connection>) -> Result<(), WsError> {
    let Some(mut frames) = conn.take_reader() else {
        // A second loop for the same connection would steal frames from the
        // first; refuse to start.
        warn!(conn_id = %conn.id(), "input stream already claimed, not starting receive loop");
        return Ok(());
    };

    let max_message_size = conn.config().max_message_size;
    let mut state = Assembly::Idle;

    while let Some(frame) = frames.next().await {
        let frame = frame?;
        trace!(
            conn_id = %conn.id(),
            opcode = ?frame.opcode,
            fin = frame.fin,
            len = frame.payload.len(),
            "received frame"
        );

        match frame.opcode {
            Opcode::Close => {
                let (code, reason) = parse_close_payload(&frame.payload);
                debug!(conn_id = %conn.id(), code, "peer sent close frame");
                let message = CloseMessage {
                    conn: Arc::clone(conn),
                    code,
                    reason,
                };
                if let Err(e) = conn.handler().on_close_message(message).await {
                    error!(conn_id = %conn.id(), error = %e, "close handler failed");
                }
                return Ok(());
            }
            Opcode::Ping => {
                conn.send_pong(frame.payload).await?;
            }
            Opcode::Pong => {
                trace!(conn_id = %conn.id(), "received pong");
            }
            Opcode::Text | Opcode::Binary => {
                if matches!(state, Assembly::Assembling { .. }) {
                    return Err(WsError::ExpectedContinuation(frame.opcode));
                }
                let is_text = frame.opcode == Opcode::Text;
                if frame.fin {
                    if !dispatch(conn, is_text, frame.payload).await? {
                        return Ok(());
                    }
                } else {
                    if frame.payload.len() > max_message_size {
                        return Err(WsError::PayloadTooLarge {
                            size: frame.payload.len() as u64,
                            max: max_message_size,
                        });
                    }
                    let mut buffer = BytesMut::with_capacity(frame.payload.len());
                    buffer.extend_from_slice(&frame.payload);
                    state = Assembly::Assembling { is_text, buffer };
                }
            }
            Opcode::Continuation => match std::mem::replace(&mut state, Assembly::Idle) {
                Assembly::Idle => {
                    warn!(
                        conn_id = %conn.id(),
                        "continuation frame outside a fragmented message, discarding"
                    );
                }
                Assembly::Assembling { is_text, mut buffer } => {
                    let assembled = buffer.len() + frame.payload.len();
                    if assembled > max_message_size {
                        return Err(WsError::PayloadTooLarge {
                            size: assembled as u64,
                            max: max_message_size,
                        });
                    }
                    buffer.extend_from_slice(&frame.payload);
                    if frame.fin {
                        if !dispatch(conn, is_text, buffer.freeze()).await? {
                            return Ok(());
                        }
                    } else {
                        state = Assembly::Assembling { is_text, buffer };
                    }
                }
            },
        }
    }

    debug!(conn_id = %conn.id(), "input stream ended");
    Ok(())
}

/// Delivers one complete message to the handler. Returns `Ok(false)` when a
/// handler error should end the loop without counting as a stream failure.
async fn dispatch(conn: &Arc<Connection>, is_text: bool, payload: Bytes) -> Result<bool, WsError> {
    let result = if is_text {
        let text = match String::from_utf8(payload.to_vec()) {
            Ok(text) => text,
            Err(_) => return Err(WsError::InvalidUtf8),
        };
        conn.handler()
            .on_text_message(TextMessage {
                conn: Arc::clone(conn),
                text,
            })
            .await
    } else {
        conn.handler()
            .on_binary_message(BinaryMessage {
                conn: Arc::clone(conn),
                data: payload,
            })
            .await
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) => {
            error!(conn_id = %conn.id(), error = %e, "message handler failed");
            Ok(false)
        }
    }
}

/// Splits a close payload into status code and optional reason.
///
/// An empty payload means the peer sent no status; that is reported as 1005
/// (`NoCode`), which itself never travels on the wire.
fn parse_close_payload(payload: &Bytes) -> (u16, Option<String>) {
    if payload.len() < 2 {
        return (u16::from(CloseCode::NoCode), None);
    }
    let code = u16::from_be_bytes([payload[0], payload[1]]);
    let reason = if payload.len() > 2 {
        Some(String::from_utf8_lossy(&payload[2..]).into_owned())
    } else {
        None
    };
    (code, reason)
}
