//! Hooks the node calls while serving connections.

use super::ClientSession;
use crate::protocol::{Disconnect, ProtocolError};

/// A client asked to subscribe to a channel.
#[derive(Debug, Clone)]
pub struct SubscribeEvent {
    /// Requested channel.
    pub channel: String,
}

/// A client asked to publish into a channel.
#[derive(Debug, Clone)]
pub struct PublishEvent {
    /// Target channel.
    pub channel: String,
    /// Payload, verbatim.
    pub data: serde_json::Value,
}

/// A client called a server-side procedure.
#[derive(Debug, Clone)]
pub struct RpcEvent {
    /// Procedure name.
    pub method: String,
    /// Arguments, verbatim.
    pub data: serde_json::Value,
}

/// Output of an RPC hook.
#[derive(Debug, Clone, Default)]
pub struct RpcReply {
    /// Result payload; `Null` sends an empty result.
    pub data: serde_json::Value,
}

/// A connected client went away.
#[derive(Debug, Clone)]
pub struct DisconnectEvent {
    /// Why the connection ended.
    pub disconnect: Disconnect,
}

/// Callbacks invoked by the node for every connected client.
///
/// Hooks run on the connection's task and must not block. Every method has
/// a default, so implementors override only what they need. Returning an
/// error from `on_subscribe`, `on_publish` or `on_rpc` refuses the command;
/// the error is sent back to the client and the connection stays open.
pub trait NodeHandler: Send + Sync + 'static {
    /// The client completed the `connect` handshake.
    fn on_connect(&self, _client: &ClientSession) {}

    /// Decides whether `client` may subscribe. Accepts by default.
    ///
    /// # Errors
    ///
    /// Return a [`ProtocolError`] to refuse the subscription.
    fn on_subscribe(
        &self,
        _client: &ClientSession,
        _event: &SubscribeEvent,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Decides whether `client` may publish. Accepts by default.
    ///
    /// # Errors
    ///
    /// Return a [`ProtocolError`] to refuse the publication.
    fn on_publish(
        &self,
        _client: &ClientSession,
        _event: &PublishEvent,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Answers an RPC. Refuses with `method not found` by default.
    ///
    /// # Errors
    ///
    /// Return a [`ProtocolError`] to send an error reply.
    fn on_rpc(&self, _client: &ClientSession, _event: &RpcEvent) -> Result<RpcReply, ProtocolError> {
        Err(ProtocolError::method_not_found())
    }

    /// The connection closed. Called once per successful `connect`.
    fn on_disconnect(&self, _client: &ClientSession, _event: &DisconnectEvent) {}
}

/// Handler used when none is registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl NodeHandler for AcceptAll {}
