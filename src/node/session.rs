//! Server-side view of a connected client.

use std::fmt;

use chrono::{DateTime, Utc};

use super::ClientId;
use crate::protocol::{ClientInfo, ProtocolType};

/// Transport a session arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportInfo {
    /// Transport name, e.g. `"websocket"`.
    pub name: &'static str,
    /// Encoding spoken over the transport.
    pub protocol: ProtocolType,
}

impl TransportInfo {
    /// WebSocket transport with the given encoding.
    #[must_use]
    pub const fn websocket(protocol: ProtocolType) -> Self {
        Self {
            name: "websocket",
            protocol,
        }
    }
}

/// A client that completed the `connect` handshake.
///
/// Passed by reference to every [`super::NodeHandler`] hook.
#[derive(Debug, Clone)]
pub struct ClientSession {
    id: ClientId,
    user: String,
    name: String,
    version: String,
    transport: TransportInfo,
    connected_at: DateTime<Utc>,
}

impl ClientSession {
    /// Creates a session stamped with the current time.
    #[must_use]
    pub fn new(
        id: ClientId,
        user: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        transport: TransportInfo,
    ) -> Self {
        Self {
            id,
            user: user.into(),
            name: name.into(),
            version: version.into(),
            transport,
            connected_at: Utc::now(),
        }
    }

    /// Connection id.
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// User id from the request credentials; empty when anonymous.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Client application name sent in `connect`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Client application version sent in `connect`.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Transport details.
    #[must_use]
    pub const fn transport(&self) -> TransportInfo {
        self.transport
    }

    /// When the handshake completed.
    #[must_use]
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Returns `true` when the user id is empty.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user.is_empty()
    }

    /// Identity attached to publications and join/leave pushes.
    #[must_use]
    pub fn info(&self) -> ClientInfo {
        ClientInfo {
            client: self.id.to_string(),
            user: self.user.clone(),
        }
    }
}

impl fmt::Display for ClientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.id, self.user)
    }
}
