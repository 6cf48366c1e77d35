//! Broker node: channel routing, connected clients and event hooks.
//!
//! A [`Node`] is constructed from a [`NodeConfig`], given a
//! [`NodeHandler`], then started with [`Node::run`]. The WebSocket
//! transport (see [`crate::transport`]) refuses connections until the node
//! is running.
//!
//! ```text
//! Node
//!  ├── Broker   channel name → broadcast sender
//!  ├── Hub      client id → outbound queue
//!  └── handler  NodeHandler hooks
//! ```

pub mod broker;
pub mod client_id;
pub mod handler;
pub mod hub;
pub mod session;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

pub use broker::{Broker, ChannelEvent};
pub use client_id::ClientId;
pub use handler::{
    AcceptAll, DisconnectEvent, NodeHandler, PublishEvent, RpcEvent, RpcReply, SubscribeEvent,
};
pub use hub::Hub;
pub use session::{ClientSession, TransportInfo};

use crate::error::NodeError;
use crate::protocol::{MessagePush, Publication, Push, PushKind, Reply};

/// Verbosity of the node's own diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Silent.
    None,
    /// Failures only.
    Error,
    /// Lifecycle events.
    #[default]
    Info,
    /// Every command.
    Debug,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "error" => Ok(Self::Error),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            other => Err(format!("unknown log level {other:?}")),
        }
    }
}

/// Node settings.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Node diagnostics verbosity.
    pub log_level: LogLevel,
    /// Broadcast buffer per channel.
    pub channel_capacity: usize,
    /// Outbound push queue per connection.
    pub client_queue_size: usize,
    /// Broadcast join/leave pushes to channel subscribers.
    pub join_leave: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            channel_capacity: 1024,
            client_queue_size: 256,
            join_leave: false,
        }
    }
}

impl NodeConfig {
    fn validate(&self) -> Result<(), NodeError> {
        if self.channel_capacity == 0 {
            return Err(NodeError::InvalidConfig(
                "channel_capacity must be positive".to_string(),
            ));
        }
        if self.client_queue_size == 0 {
            return Err(NodeError::InvalidConfig(
                "client_queue_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

struct NodeInner {
    config: NodeConfig,
    handler: OnceLock<Arc<dyn NodeHandler>>,
    running: AtomicBool,
    broker: Broker,
    hub: Hub,
}

/// Shared handle to the broker node. Cheap to clone.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("config", &self.inner.config)
            .field("running", &self.is_running())
            .field("has_handler", &self.inner.handler.get().is_some())
            .finish_non_exhaustive()
    }
}

impl Node {
    /// Creates a stopped node.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::InvalidConfig`] if a capacity is zero.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let broker = Broker::new(config.channel_capacity);
        Ok(Self {
            inner: Arc::new(NodeInner {
                config,
                handler: OnceLock::new(),
                running: AtomicBool::new(false),
                broker,
                hub: Hub::new(),
            }),
        })
    }

    /// Registers the hooks called for every connection.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::AlreadyRunning`] after [`Node::run`], or
    /// [`NodeError::HandlerAlreadySet`] on a second registration.
    pub fn set_handler(&self, handler: impl NodeHandler) -> Result<(), NodeError> {
        if self.is_running() {
            return Err(NodeError::AlreadyRunning);
        }
        self.inner
            .handler
            .set(Arc::new(handler))
            .map_err(|_| NodeError::HandlerAlreadySet)
    }

    /// Starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::AlreadyRunning`] if called twice.
    pub fn run(&self) -> Result<(), NodeError> {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return Err(NodeError::AlreadyRunning);
        }
        let default_handler = self.inner.handler.get().is_none();
        if self.log_enabled(LogLevel::Info) {
            tracing::info!(
                channel_capacity = self.inner.config.channel_capacity,
                join_leave = self.inner.config.join_leave,
                default_handler,
                "node running"
            );
        }
        Ok(())
    }

    /// Returns `true` once [`Node::run`] succeeded.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Node settings.
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    /// Returns `true` if diagnostics at `level` should be emitted.
    #[must_use]
    pub fn log_enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None && level <= self.inner.config.log_level
    }

    /// Registered hooks, or [`AcceptAll`] when none were set.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn NodeHandler> {
        self.inner
            .handler
            .get()
            .map_or_else(|| Arc::new(AcceptAll) as Arc<dyn NodeHandler>, Arc::clone)
    }

    /// Channel broker.
    #[must_use]
    pub fn broker(&self) -> &Broker {
        &self.inner.broker
    }

    /// Connected-client registry.
    #[must_use]
    pub fn hub(&self) -> &Hub {
        &self.inner.hub
    }

    /// Publishes server-side data into `channel`.
    ///
    /// Returns the number of subscribers reached.
    pub async fn publish(&self, channel: &str, data: serde_json::Value) -> usize {
        let delivered = self
            .inner
            .broker
            .publish(
                channel,
                ChannelEvent::Publication(Publication { data, info: None }),
            )
            .await;
        if self.log_enabled(LogLevel::Debug) {
            tracing::debug!(channel, delivered, "server publication");
        }
        delivered
    }

    /// Sends an asynchronous message to one connected client.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::ClientNotFound`] if `client` is not connected,
    /// or [`NodeError::ClientUnavailable`] if its queue is full or closed.
    pub async fn send(&self, client: ClientId, data: serde_json::Value) -> Result<(), NodeError> {
        let Some(outbound) = self.inner.hub.get(client).await else {
            return Err(NodeError::ClientNotFound(client.to_string()));
        };
        let push = Reply::push(Push {
            channel: String::new(),
            kind: PushKind::Message(MessagePush { data }),
        });
        outbound
            .try_send(push)
            .map_err(|_| NodeError::ClientUnavailable(client.to_string()))
    }

    /// Number of connected clients.
    pub async fn client_count(&self) -> usize {
        self.inner.hub.len().await
    }

    /// Number of subscribers on `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.inner.broker.subscriber_count(channel).await
    }
}
