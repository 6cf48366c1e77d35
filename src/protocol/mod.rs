//! JSON wire protocol shared by the node and the client.
//!
//! Every WebSocket text frame carries exactly one [`Command`] (client →
//! server) or one [`Reply`] (server → client). Replies echo the command
//! `id`; pushes are replies without an id.
//!
//! ```text
//! → {"id":1,"connect":{"name":"listening-rust-client","version":"0.0.1"}}
//! ← {"id":1,"connect":{"client":"6f1c…","version":"0.1.0"}}
//! → {"id":2,"subscribe":{"channel":"listening.server"}}
//! ← {"id":2,"subscribe":{}}
//! ← {"push":{"channel":"listening.server","pub":{"data":{"hello":1}}}}
//! ```

pub mod command;
pub mod reply;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use command::{
    Command, ConnectRequest, Method, PublishRequest, RpcRequest, SubscribeRequest,
    UnsubscribeRequest,
};
pub use reply::{
    ClientInfo, ConnectResult, JoinLeave, MessagePush, Publication, PublishResult, Push, PushKind,
    Reply, ReplyBody, RpcResult, SubscribeResult, UnsubscribeResult,
};

/// Encoding negotiated for a connection.
///
/// Only JSON is spoken; the type exists so the transport can report it and
/// so an unknown `format` query parameter can be rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolType {
    /// One JSON document per text frame.
    #[default]
    Json,
}

impl ProtocolType {
    /// Parses the `format` query parameter of an upgrade request.
    #[must_use]
    pub fn from_query(value: &str) -> Option<Self> {
        match value {
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
        }
    }
}

/// Error carried in a reply when the server refuses a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({code})")]
pub struct ProtocolError {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable message.
    pub message: String,
}

impl ProtocolError {
    /// Creates an error with an arbitrary code.
    #[must_use]
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// `103 permission denied`.
    #[must_use]
    pub fn permission_denied() -> Self {
        Self::new(103, "permission denied")
    }

    /// `104 method not found`.
    #[must_use]
    pub fn method_not_found() -> Self {
        Self::new(104, "method not found")
    }

    /// `105 already subscribed`.
    #[must_use]
    pub fn already_subscribed() -> Self {
        Self::new(105, "already subscribed")
    }

    /// `107 bad request`.
    #[must_use]
    pub fn bad_request() -> Self {
        Self::new(107, "bad request")
    }

    /// `109 not subscribed`.
    #[must_use]
    pub fn not_subscribed() -> Self {
        Self::new(109, "not subscribed")
    }
}

/// Reason a connection was closed, sent as the WebSocket close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    /// Close code (3000–4999 are application codes).
    pub code: u16,
    /// Short human-readable reason.
    pub reason: String,
}

impl Disconnect {
    /// Peer closed the socket or the stream ended.
    pub const CONNECTION_CLOSED: u16 = 3000;
    /// The client called `disconnect()`.
    pub const DISCONNECT_CALLED: u16 = 3001;
    /// Malformed frame or protocol violation.
    pub const BAD_REQUEST: u16 = 3501;

    /// Creates a disconnect with the given code and reason.
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// `3000 connection closed`.
    #[must_use]
    pub fn connection_closed() -> Self {
        Self::new(Self::CONNECTION_CLOSED, "connection closed")
    }

    /// `3001 disconnect called`.
    #[must_use]
    pub fn disconnect_called() -> Self {
        Self::new(Self::DISCONNECT_CALLED, "disconnect called")
    }

    /// `3501 bad request`.
    #[must_use]
    pub fn bad_request() -> Self {
        Self::new(Self::BAD_REQUEST, "bad request")
    }
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason)
    }
}
