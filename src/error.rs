//! Error types for every layer of the crate.
//!
//! - [`NodeError`]: node construction and lifecycle.
//! - [`ClientError`]: client connection and subscription calls.
//! - [`LatchError`]: misuse of the startup latch.
//! - [`ConfigError`]: invalid environment configuration.
//! - [`HttpError`]: upgrade request rejections, mapped to HTTP responses.
//!
//! Wire-level refusals are [`crate::protocol::ProtocolError`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::protocol::ProtocolError;

/// Errors raised by [`crate::node::Node`].
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// A [`crate::node::NodeConfig`] field is out of range.
    #[error("invalid node config: {0}")]
    InvalidConfig(String),

    /// `run` or `set_handler` was called on a running node.
    #[error("node is already running")]
    AlreadyRunning,

    /// A handler was registered twice.
    #[error("node handler already set")]
    HandlerAlreadySet,

    /// No connected client has the given id.
    #[error("client not found: {0}")]
    ClientNotFound(String),

    /// The client's outbound queue is closed or full.
    #[error("client {0} is not accepting messages")]
    ClientUnavailable(String),
}

/// Errors raised by [`crate::client::Client`] and
/// [`crate::client::Subscription`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// `connect` was called while connecting or connected.
    #[error("client is already connected")]
    AlreadyConnected,

    /// The operation needs an established connection.
    #[error("client is not connected")]
    NotConnected,

    /// The connection went away before a reply arrived.
    #[error("connection closed")]
    Closed,

    /// A subscription to the channel already exists on this client.
    #[error("duplicate subscription: {0}")]
    DuplicateSubscription(String),

    /// Channel names must be non-empty.
    #[error("invalid channel name")]
    InvalidChannel,

    /// `subscribe` was called on a subscription that is not unsubscribed.
    #[error("subscription to {0} is already active")]
    AlreadySubscribed(String),

    /// The server answered with an error.
    #[error("server rejected command: {0}")]
    Rejected(#[from] ProtocolError),

    /// The server answered with a reply of the wrong kind.
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),

    /// WebSocket dial or I/O failure.
    #[error("transport error: {0}")]
    Transport(#[from] Box<tokio_tungstenite::tungstenite::Error>),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

/// Errors raised by [`crate::latch::CountdownLatch`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LatchError {
    /// The latch already reached zero and cannot be re-armed.
    #[error("latch already released")]
    Released,
}

/// Errors raised while loading [`crate::config::DemoConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Environment variable name.
        key: &'static str,
        /// Raw value found in the environment.
        value: String,
    },
}

/// Structured JSON error response body.
///
/// ```json
/// { "error": { "code": 401, "message": "missing credentials" } }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code (mirrors the HTTP status).
    pub code: u16,
    /// Human-readable error message.
    pub message: String,
}

/// Rejections of a WebSocket upgrade request.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// No credentials were attached to the request.
    #[error("missing credentials")]
    Unauthorized,

    /// The node has not been started.
    #[error("node is not running")]
    NodeNotRunning,

    /// The `format` query parameter names an unknown encoding.
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
}

impl HttpError {
    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NodeNotRunning => StatusCode::SERVICE_UNAVAILABLE,
            Self::UnsupportedProtocol(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: status.as_u16(),
                message: self.to_string(),
            },
        };
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn http_error_status_codes() {
        assert_eq!(HttpError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            HttpError::NodeNotRunning.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            HttpError::UnsupportedProtocol("xml".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn http_error_into_response_keeps_status() {
        let response = HttpError::NodeNotRunning.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn rejected_wraps_protocol_error() {
        let err = ClientError::from(ProtocolError::permission_denied());
        assert_eq!(
            err.to_string(),
            "server rejected command: permission denied (103)"
        );
    }
}
