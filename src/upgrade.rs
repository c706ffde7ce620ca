//! HTTP upgrade handshake (RFC 6455 §4) and axum route integration.
//!
//! The validation itself is transport-agnostic: [`validate_upgrade`] checks
//! the request method and the `Sec-WebSocket-Key` header and produces the
//! accept key. [`websocket_route`] mounts that validation on an axum router,
//! answers `101 Switching Protocols`, and adopts the upgraded byte stream
//! into a [`Connection`] registered with the [`ConnectionManager`].
//!
//! Per the handshake contract, `Upgrade: websocket` and
//! `Sec-WebSocket-Version` are not validated here.

use crate::config::WsConfig;
use crate::connection::Connection;
use crate::manager::ConnectionManager;
use crate::message::MessageHandler;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use base64::Engine;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use sha1::{Digest, Sha1};
use std::sync::Arc;
use tracing::{debug, error};

/// RFC 6455 GUID appended to the client key before hashing.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Derives the `Sec-WebSocket-Accept` value from a client key:
/// `base64(sha1(key ++ GUID))`.
///
/// # Example
///
/// ```
/// use websocket_hub::derive_accept_key;
///
/// let accept = derive_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn derive_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Snapshot of the upgrade request handed to
/// [`MessageHandler::on_connection_established`].
#[derive(Debug, Clone)]
pub struct UpgradeRequest {
    /// Request path of the upgrade.
    pub path: String,
    /// Request headers, case-insensitive and multi-valued.
    pub headers: HeaderMap,
}

/// Reasons an upgrade request is refused. Rendered directly into the HTTP
/// error response; no connection is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeRejection {
    /// The request method was not GET.
    MethodNotAllowed,
    /// `Sec-WebSocket-Key` was missing or empty.
    MissingKey,
    /// The underlying HTTP connection cannot be upgraded.
    NotUpgradable,
}

impl UpgradeRejection {
    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::MissingKey | Self::NotUpgradable => StatusCode::BAD_REQUEST,
        }
    }

    #[must_use]
    pub fn body(self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "Only GET requests are allowed.",
            Self::MissingKey => "Missing Sec-WebSocket-Key header.",
            Self::NotUpgradable => "Connection is not upgradable.",
        }
    }
}

impl IntoResponse for UpgradeRejection {
    fn into_response(self) -> Response {
        let body = self.body();
        let mut response = (self.status(), body).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        response
    }
}

/// Validates an upgrade request and derives the accept key.
///
/// Checks run in order: the method must be GET (`405` otherwise), then
/// `Sec-WebSocket-Key` must be present and non-empty (`400` otherwise).
pub fn validate_upgrade(method: &Method, headers: &HeaderMap) -> Result<String, UpgradeRejection> {
    if method != Method::GET {
        return Err(UpgradeRejection::MethodNotAllowed);
    }

    let key = headers
        .get(header::SEC_WEBSOCKET_KEY)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if key.is_empty() {
        return Err(UpgradeRejection::MissingKey);
    }

    Ok(derive_accept_key(key))
}

/// Shared state behind a websocket route: the registry, the user handler,
/// and the per-connection size limits.
#[derive(Clone)]
pub struct WebSocketEndpoint {
    manager: Arc<ConnectionManager>,
    handler: Arc<dyn MessageHandler>,
    config: WsConfig,
}

/// Mounts a WebSocket endpoint at `path` with default limits.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use websocket_hub::{websocket_route, ConnectionManager, MessageHandler, TextMessage};
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
///
/// #[tokio::main]
/// async fn main() {
///     let manager = Arc::new(ConnectionManager::new());
///     let app = websocket_route("/ws", Arc::clone(&manager), Arc::new(EchoHandler));
///
///     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
///     axum::serve(listener, app).await.unwrap();
/// }
/// ```
pub fn websocket_route(
    path: &str,
    manager: Arc<ConnectionManager>,
    handler: Arc<dyn MessageHandler>,
) -> Router {
    websocket_route_with_config(path, manager, handler, WsConfig::default())
}

/// Mounts a WebSocket endpoint at `path` with explicit size limits.
pub fn websocket_route_with_config(
    path: &str,
    manager: Arc<ConnectionManager>,
    handler: Arc<dyn MessageHandler>,
    config: WsConfig,
) -> Router {
    // `any` rather than `get` so a non-GET request reaches our 405 with its
    // prescribed body instead of axum's default method rejection.
    Router::new()
        .route(path, any(upgrade_handler))
        .with_state(WebSocketEndpoint {
            manager,
            handler,
            config,
        })
}

/// axum handler performing the upgrade.
///
/// On success the response is `101 Switching Protocols` and the raw stream
/// is adopted in a background task once hyper completes the switch.
pub async fn upgrade_handler(
    State(endpoint): State<WebSocketEndpoint>,
    request: Request,
) -> Response {
    let (mut parts, _body) = request.into_parts();

    let accept_key = match validate_upgrade(&parts.method, &parts.headers) {
        Ok(key) => key,
        Err(rejection) => {
            debug!(method = %parts.method, uri = %parts.uri, ?rejection, "upgrade rejected");
            return rejection.into_response();
        }
    };

    let Some(on_upgrade) = parts.extensions.remove::<OnUpgrade>() else {
        debug!(uri = %parts.uri, "request has no upgrade extension");
        return UpgradeRejection::NotUpgradable.into_response();
    };

    let Ok(accept_value) = HeaderValue::from_str(&accept_key) else {
        // base64 output is always a valid header value.
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let upgrade_request = UpgradeRequest {
        path: parts.uri.path().to_owned(),
        headers: parts.headers,
    };

    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                let (read_half, write_half) = tokio::io::split(TokioIo::new(upgraded));
                let conn = Arc::new(Connection::new(
                    read_half,
                    write_half,
                    Arc::clone(&endpoint.handler),
                    endpoint.config,
                ));
                debug!(conn_id = %conn.id(), path = %upgrade_request.path, "websocket established");
                endpoint.manager.add(conn, upgrade_request).await;
            }
            Err(e) => error!(error = %e, "websocket upgrade failed"),
        }
    });

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = response.headers_mut();
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(header::SEC_WEBSOCKET_ACCEPT, accept_value);
    response
}
