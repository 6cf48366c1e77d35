//! Events delivered to client and subscription hooks.

use crate::protocol::{ClientInfo, ProtocolError};

/// The client started dialing.
#[derive(Debug, Clone)]
pub struct ConnectingEvent {
    /// Why the client is connecting.
    pub reason: String,
}

/// The server accepted the `connect` command.
#[derive(Debug, Clone)]
pub struct ConnectedEvent {
    /// Id assigned by the server.
    pub client_id: String,
    /// Server version.
    pub version: String,
}

/// The connection ended.
#[derive(Debug, Clone)]
pub struct DisconnectedEvent {
    /// Close code.
    pub code: u16,
    /// Close reason.
    pub reason: String,
}

/// A connection-level failure.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// Description of the failure.
    pub error: String,
}

/// An asynchronous message addressed to this client.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    /// Payload, verbatim.
    pub data: serde_json::Value,
}

/// The subscription is being established.
#[derive(Debug, Clone)]
pub struct SubscribingEvent {
    /// Why the subscription is (re)subscribing.
    pub reason: String,
}

/// The server confirmed the subscription.
#[derive(Debug, Clone, Default)]
pub struct SubscribedEvent {}

/// The subscription was removed.
#[derive(Debug, Clone)]
pub struct UnsubscribedEvent {
    /// Why it ended.
    pub reason: String,
}

/// The server refused the subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionErrorEvent {
    /// The server's error.
    pub error: ProtocolError,
}

/// New data in the subscribed channel.
#[derive(Debug, Clone)]
pub struct PublicationEvent {
    /// Payload, verbatim.
    pub data: serde_json::Value,
    /// Publisher, if the publication came from a client.
    pub info: Option<ClientInfo>,
}

/// Another client subscribed to the channel.
#[derive(Debug, Clone)]
pub struct JoinEvent {
    /// Who joined.
    pub info: ClientInfo,
}

/// Another client left the channel.
#[derive(Debug, Clone)]
pub struct LeaveEvent {
    /// Who left.
    pub info: ClientInfo,
}
