//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Extension, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::connection::run_connection;
use crate::auth::Credentials;
use crate::error::HttpError;
use crate::node::{Node, TransportInfo};
use crate::protocol::ProtocolType;

/// Read buffer size for upgraded sockets.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct UpgradeParams {
    /// Encoding; only `json` is accepted.
    #[serde(default)]
    pub format: Option<String>,
}

/// `GET /connection/websocket`: upgrade to a real-time connection.
///
/// Requires [`Credentials`] in the request extensions, normally inserted
/// by [`crate::auth::anonymous_auth`].
///
/// # Errors
///
/// - [`HttpError::Unauthorized`] without credentials.
/// - [`HttpError::NodeNotRunning`] before [`Node::run`].
/// - [`HttpError::UnsupportedProtocol`] for an unknown `format`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(node): State<Node>,
    Query(params): Query<UpgradeParams>,
    credentials: Option<Extension<Credentials>>,
) -> Result<Response, HttpError> {
    let Some(Extension(credentials)) = credentials else {
        return Err(HttpError::Unauthorized);
    };
    if !node.is_running() {
        return Err(HttpError::NodeNotRunning);
    }
    let protocol = match params.format.as_deref() {
        None => ProtocolType::Json,
        Some(format) => ProtocolType::from_query(format)
            .ok_or_else(|| HttpError::UnsupportedProtocol(format.to_string()))?,
    };
    let transport = TransportInfo::websocket(protocol);

    Ok(ws
        .read_buffer_size(READ_BUFFER_SIZE)
        .on_upgrade(move |socket| run_connection(socket, node, credentials, transport))
        .into_response())
}
