//! Real-time client for the node's WebSocket endpoint.
//!
//! A [`Client`] owns one connection. Hooks are registered before
//! [`Client::connect`]; they run on the task that drives the connection,
//! so they must not block. Subscriptions are created with
//! [`Client::new_subscription`] and activated with
//! [`Subscription::subscribe`].
//!
//! ```rust,ignore
//! let client = Client::new("ws://localhost:8000/connection/websocket", ClientConfig::default());
//! client.on_connected(|client, _| {
//!     if let Ok(sub) = client.new_subscription("news") {
//!         sub.on_publication(|e| println!("{}", e.data));
//!         let _ = sub.subscribe();
//!     }
//! });
//! client.connect().await?;
//! ```

mod connection;
pub mod events;
pub mod subscription;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

pub use events::{
    ConnectedEvent, ConnectingEvent, DisconnectedEvent, ErrorEvent, JoinEvent, LeaveEvent,
    MessageEvent, PublicationEvent, SubscribedEvent, SubscribingEvent, SubscriptionErrorEvent,
    UnsubscribedEvent,
};
pub use subscription::{Subscription, SubscriptionState};

use self::connection::{Outbound, ReplySink};
use crate::error::ClientError;
use crate::protocol::{ConnectRequest, Method, ProtocolType, PublishRequest, RpcRequest};

/// Client identity sent in the `connect` command.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Wire encoding.
    pub protocol: ProtocolType,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "rust-client".to_string(),
            version: "0.0.0".to_string(),
            protocol: ProtocolType::Json,
        }
    }
}

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected; [`Client::connect`] may be called.
    Disconnected,
    /// Dialing or waiting for the `connect` reply.
    Connecting,
    /// Handshake complete.
    Connected,
}

type Hook<E> = Arc<dyn Fn(&Client, E) + Send + Sync>;

#[derive(Default)]
struct ClientHooks {
    connecting: Option<Hook<ConnectingEvent>>,
    connected: Option<Hook<ConnectedEvent>>,
    disconnected: Option<Hook<DisconnectedEvent>>,
    error: Option<Hook<ErrorEvent>>,
    message: Option<Hook<MessageEvent>>,
}

struct ClientState {
    status: ConnectionState,
    client_id: Option<String>,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
}

pub(crate) struct ClientInner {
    url: String,
    config: ClientConfig,
    state: Mutex<ClientState>,
    hooks: Mutex<ClientHooks>,
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

/// Handle to one client connection. Clones share the connection.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.inner.url)
            .field("name", &self.inner.config.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Locks a std mutex, recovering the data if a hook panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Client {
    /// Creates a disconnected client for the endpoint at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                url: url.into(),
                config,
                state: Mutex::new(ClientState {
                    status: ConnectionState::Disconnected,
                    client_id: None,
                    outbound: None,
                }),
                hooks: Mutex::new(ClientHooks::default()),
                subscriptions: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<ClientInner> {
        Arc::downgrade(&self.inner)
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Identity sent on connect.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        lock(&self.inner.state).status
    }

    /// Id assigned by the server on the last successful connect.
    #[must_use]
    pub fn client_id(&self) -> Option<String> {
        lock(&self.inner.state).client_id.clone()
    }

    /// Called when dialing starts.
    pub fn on_connecting(&self, hook: impl Fn(&Client, ConnectingEvent) + Send + Sync + 'static) {
        lock(&self.inner.hooks).connecting = Some(Arc::new(hook));
    }

    /// Called once the server accepted the connection.
    pub fn on_connected(&self, hook: impl Fn(&Client, ConnectedEvent) + Send + Sync + 'static) {
        lock(&self.inner.hooks).connected = Some(Arc::new(hook));
    }

    /// Called when an established connection ends.
    pub fn on_disconnected(
        &self,
        hook: impl Fn(&Client, DisconnectedEvent) + Send + Sync + 'static,
    ) {
        lock(&self.inner.hooks).disconnected = Some(Arc::new(hook));
    }

    /// Called on transport or protocol failures.
    pub fn on_error(&self, hook: impl Fn(&Client, ErrorEvent) + Send + Sync + 'static) {
        lock(&self.inner.hooks).error = Some(Arc::new(hook));
    }

    /// Called for asynchronous messages sent to this client by the server.
    pub fn on_message(&self, hook: impl Fn(&Client, MessageEvent) + Send + Sync + 'static) {
        lock(&self.inner.hooks).message = Some(Arc::new(hook));
    }

    /// Dials the endpoint and performs the `connect` handshake.
    ///
    /// Fires `connecting` first and `connected` on success. Automatic
    /// reconnection is not attempted after a later disconnect.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AlreadyConnected`] unless disconnected.
    /// - [`ClientError::Transport`] if the dial fails.
    /// - [`ClientError::Rejected`] if the server refuses the handshake.
    /// - [`ClientError::Closed`] if the socket closes before the reply.
    pub async fn connect(&self) -> Result<(), ClientError> {
        {
            let mut state = lock(&self.inner.state);
            if state.status != ConnectionState::Disconnected {
                return Err(ClientError::AlreadyConnected);
            }
            state.status = ConnectionState::Connecting;
        }
        self.emit(
            |h| h.connecting.clone(),
            ConnectingEvent {
                reason: "connect called".to_string(),
            },
        );

        let stream = match tokio_tungstenite::connect_async(self.inner.url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(err) => return Err(self.fail_connect(err.into())),
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        lock(&self.inner.state).outbound = Some(outbound_tx);
        tokio::spawn(
            connection::run(stream, outbound_rx, self.clone()).instrument(tracing::Span::current()),
        );

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = ConnectRequest {
            name: self.inner.config.name.clone(),
            version: self.inner.config.version.clone(),
        };
        if let Err(err) = self.send(Method::Connect(request), ReplySink::Connect(reply_tx)) {
            return Err(self.fail_connect(err));
        }
        let result = match reply_rx.await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => return Err(self.fail_connect(err)),
            Err(_) => return Err(self.fail_connect(ClientError::Closed)),
        };

        {
            let mut state = lock(&self.inner.state);
            // The connection task may have finished between the reply and here.
            if state.status != ConnectionState::Connecting || state.outbound.is_none() {
                drop(state);
                return Err(self.fail_connect(ClientError::Closed));
            }
            state.status = ConnectionState::Connected;
            state.client_id = Some(result.client.clone());
        }
        tracing::debug!(client = %result.client, "connect accepted");
        self.emit(
            |h| h.connected.clone(),
            ConnectedEvent {
                client_id: result.client,
                version: result.version,
            },
        );
        Ok(())
    }

    /// Closes the connection and waits for the connection task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if there is no connection.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let outbound = lock(&self.inner.state)
            .outbound
            .clone()
            .ok_or(ClientError::NotConnected)?;
        let (done_tx, done_rx) = oneshot::channel();
        outbound
            .send(Outbound::Close(done_tx))
            .map_err(|_| ClientError::Closed)?;
        // The task drops `done_tx` on exit either way.
        let _ = done_rx.await;
        Ok(())
    }

    /// Creates a subscription to `channel`. Call
    /// [`Subscription::subscribe`] to activate it.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidChannel`] for an empty name.
    /// - [`ClientError::DuplicateSubscription`] if one already exists.
    pub fn new_subscription(&self, channel: &str) -> Result<Subscription, ClientError> {
        if channel.is_empty() {
            return Err(ClientError::InvalidChannel);
        }
        let mut subs = lock(&self.inner.subscriptions);
        if subs.contains_key(channel) {
            return Err(ClientError::DuplicateSubscription(channel.to_string()));
        }
        let sub = Subscription::new(channel, self.downgrade());
        subs.insert(channel.to_string(), sub.clone());
        Ok(sub)
    }

    /// Looks up an existing subscription.
    #[must_use]
    pub fn get_subscription(&self, channel: &str) -> Option<Subscription> {
        lock(&self.inner.subscriptions).get(channel).cloned()
    }

    /// Publishes `data` into `channel` and waits for the server's answer.
    ///
    /// The client does not need to be subscribed to `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`], [`ClientError::Closed`] or
    /// [`ClientError::Rejected`].
    pub async fn publish(&self, channel: &str, data: serde_json::Value) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        let request = PublishRequest {
            channel: channel.to_string(),
            data,
        };
        self.send(Method::Publish(request), ReplySink::Publish(tx))?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Calls a server-side procedure and returns its result payload.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`], [`ClientError::Closed`] or
    /// [`ClientError::Rejected`].
    pub async fn rpc(
        &self,
        method: &str,
        data: serde_json::Value,
    ) -> Result<serde_json::Value, ClientError> {
        let (tx, rx) = oneshot::channel();
        let request = RpcRequest {
            method: method.to_string(),
            data,
        };
        self.send(Method::Rpc(request), ReplySink::Rpc(tx))?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Queues a command for the connection task.
    pub(crate) fn send(&self, method: Method, sink: ReplySink) -> Result<(), ClientError> {
        let state = lock(&self.inner.state);
        let ready = match method {
            Method::Connect(_) => state.status == ConnectionState::Connecting,
            _ => state.status == ConnectionState::Connected,
        };
        let Some(outbound) = state.outbound.as_ref().filter(|_| ready) else {
            return Err(ClientError::NotConnected);
        };
        outbound
            .send(Outbound::Command { method, sink })
            .map_err(|_| ClientError::Closed)
    }

    fn fail_connect(&self, err: ClientError) -> ClientError {
        let outbound = {
            let mut state = lock(&self.inner.state);
            state.status = ConnectionState::Disconnected;
            state.outbound.take()
        };
        if let Some(outbound) = outbound {
            let (done_tx, _) = oneshot::channel();
            let _ = outbound.send(Outbound::Close(done_tx));
        }
        self.emit_error(err.to_string());
        err
    }

    /// Called by the connection task when the socket is gone.
    pub(crate) fn connection_closed(&self, event: DisconnectedEvent) {
        let previous = {
            let mut state = lock(&self.inner.state);
            state.outbound = None;
            std::mem::replace(&mut state.status, ConnectionState::Disconnected)
        };
        if previous != ConnectionState::Connected {
            return;
        }
        let subs: Vec<Subscription> = lock(&self.inner.subscriptions).values().cloned().collect();
        for sub in subs {
            sub.reset(&event.reason);
        }
        self.emit(|h| h.disconnected.clone(), event);
    }

    pub(crate) fn emit_error(&self, error: String) {
        self.emit(|h| h.error.clone(), ErrorEvent { error });
    }

    pub(crate) fn emit_message(&self, event: MessageEvent) {
        self.emit(|h| h.message.clone(), event);
    }

    /// Runs a hook outside the hooks lock so it may call back into the client.
    fn emit<E>(&self, pick: impl FnOnce(&ClientHooks) -> Option<Hook<E>>, event: E) {
        let hook = pick(&lock(&self.inner.hooks));
        if let Some(hook) = hook {
            hook(self, event);
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new("ws://127.0.0.1:1/connection/websocket", ClientConfig::default())
    }

    #[test]
    fn new_client_is_disconnected() {
        let c = client();
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert!(c.client_id().is_none());
    }

    #[test]
    fn subscription_names_are_unique_and_non_empty() {
        let c = client();
        assert!(matches!(
            c.new_subscription(""),
            Err(ClientError::InvalidChannel)
        ));
        let Ok(sub) = c.new_subscription("news") else {
            panic!("first subscription failed");
        };
        assert_eq!(sub.channel(), "news");
        assert!(matches!(
            c.new_subscription("news"),
            Err(ClientError::DuplicateSubscription(_))
        ));
        assert!(c.get_subscription("news").is_some());
    }

    #[test]
    fn subscribe_before_connect_fails() {
        let c = client();
        let Ok(sub) = c.new_subscription("news") else {
            panic!("subscription failed");
        };
        assert!(matches!(sub.subscribe(), Err(ClientError::NotConnected)));
        assert_eq!(sub.state(), SubscriptionState::Unsubscribed);
    }

    #[tokio::test]
    async fn failed_dial_reports_error_and_resets_state() {
        let c = client();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&errors);
        c.on_error(move |_, e| lock(&seen).push(e.error));

        let result = c.connect().await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert_eq!(lock(&errors).len(), 1);
    }

    #[tokio::test]
    async fn publish_requires_connection() {
        let c = client();
        let result = c.publish("news", serde_json::json!(1)).await;
        assert!(matches!(result, Err(ClientError::NotConnected)));
    }
}
