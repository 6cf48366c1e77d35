//! Demo clients that connect, subscribe to the shared channel and log
//! everything they observe.

use crate::client::{Client, ClientConfig};
use crate::config::DemoConfig;
use crate::protocol::ProtocolType;

/// Builds a client with logging hooks for every lifecycle event.
///
/// Once connected, the client subscribes to `config.channel`. Subscription
/// failures are logged and never abort the demo.
#[must_use]
pub fn listening_client(index: usize, config: &DemoConfig) -> Client {
    let client = Client::new(
        config.server_url.clone(),
        ClientConfig {
            name: config.client_name.clone(),
            version: config.client_version.clone(),
            protocol: ProtocolType::Json,
        },
    );

    client.on_connecting(move |_, event| {
        tracing::info!(index, reason = %event.reason, "connecting");
    });

    let channel = config.channel.clone();
    client.on_connected(move |client, event| {
        tracing::info!(index, client = %event.client_id, version = %event.version, "connected");
        subscribe_channel(index, client, &channel);
    });

    client.on_disconnected(move |_, event| {
        // TODO: automatic reconnect
        tracing::info!(index, code = event.code, reason = %event.reason, "disconnected");
    });

    client.on_error(move |_, event| {
        tracing::error!(index, error = %event.error, "client error");
    });

    client.on_message(move |_, event| {
        tracing::info!(index, data = %event.data, "message from server");
    });

    client
}

fn subscribe_channel(index: usize, client: &Client, channel: &str) {
    let sub = match client.new_subscription(channel) {
        Ok(sub) => sub,
        Err(err) => {
            tracing::error!(index, channel, error = %err, "cannot create subscription");
            return;
        }
    };

    sub.on_subscribing(move |event| {
        tracing::debug!(index, reason = %event.reason, "subscribing");
    });
    let name = channel.to_string();
    sub.on_subscribed(move |_| {
        tracing::info!(index, channel = %name, "subscribed");
    });
    sub.on_unsubscribed(move |event| {
        tracing::info!(index, reason = %event.reason, "unsubscribed");
    });
    sub.on_error(move |event| {
        tracing::error!(index, code = event.error.code, error = %event.error.message, "subscription error");
    });
    sub.on_join(move |event| {
        tracing::info!(index, client = %event.info.client, user = %event.info.user, "someone joined");
    });
    sub.on_leave(move |event| {
        tracing::info!(index, client = %event.info.client, user = %event.info.user, "someone left");
    });
    sub.on_publication(move |event| {
        let from = event.info.as_ref().map(|info| info.client.as_str());
        tracing::info!(index, data = %event.data, from, "publication");
    });

    if let Err(err) = sub.subscribe() {
        tracing::error!(index, channel, error = %err, "cannot subscribe");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ConnectionState;

    #[test]
    fn client_uses_demo_identity() {
        let config = DemoConfig::default();
        let client = listening_client(0, &config);
        assert_eq!(client.url(), config.server_url);
        assert_eq!(client.config().name, "listening-rust-client");
        assert_eq!(client.config().version, "0.0.1");
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
