//! Server-side hooks that log every event and accept everything.

use chrono::Utc;

use crate::latch::CountdownLatch;
use crate::node::{
    ClientSession, DisconnectEvent, NodeHandler, PublishEvent, RpcEvent, RpcReply, SubscribeEvent,
};
use crate::protocol::ProtocolError;

/// [`NodeHandler`] that logs each hook and counts connects down on a
/// startup latch.
///
/// No authorization, validation or rate limiting: subscriptions and
/// publications are always accepted and RPCs get an empty result.
#[derive(Debug, Clone)]
pub struct LoggingHandler {
    connected: CountdownLatch,
}

impl LoggingHandler {
    /// Creates a handler that calls [`CountdownLatch::done`] on every
    /// successful connect.
    #[must_use]
    pub fn new(connected: CountdownLatch) -> Self {
        Self { connected }
    }
}

impl NodeHandler for LoggingHandler {
    fn on_connect(&self, client: &ClientSession) {
        let transport = client.transport();
        tracing::info!(
            client = %client.id(),
            user = client.user(),
            name = client.name(),
            version = client.version(),
            transport = transport.name,
            protocol = %transport.protocol,
            "client connected"
        );
        self.connected.done();
    }

    fn on_subscribe(
        &self,
        client: &ClientSession,
        event: &SubscribeEvent,
    ) -> Result<(), ProtocolError> {
        tracing::info!(client = %client.id(), user = client.user(), channel = %event.channel, "client subscribes");
        Ok(())
    }

    fn on_publish(&self, client: &ClientSession, event: &PublishEvent) -> Result<(), ProtocolError> {
        tracing::info!(
            client = %client.id(),
            user = client.user(),
            channel = %event.channel,
            data = %event.data,
            "client publishes"
        );
        Ok(())
    }

    fn on_rpc(&self, client: &ClientSession, event: &RpcEvent) -> Result<RpcReply, ProtocolError> {
        tracing::info!(client = %client.id(), method = %event.method, data = %event.data, "client rpc");
        Ok(RpcReply::default())
    }

    fn on_disconnect(&self, client: &ClientSession, event: &DisconnectEvent) {
        let connected_ms = (Utc::now() - client.connected_at()).num_milliseconds();
        tracing::info!(
            client = %client.id(),
            user = client.user(),
            connected_ms,
            reason = %event.disconnect,
            "client disconnected"
        );
    }
}
