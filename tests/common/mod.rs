//! Shared helpers for the end-to-end tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::timeout;

use pubsub_listener::http::{WEBSOCKET_PATH, build_router, spawn_server};
use pubsub_listener::node::{
    ClientSession, DisconnectEvent, Node, NodeConfig, NodeHandler, PublishEvent, RpcEvent,
    RpcReply, SubscribeEvent,
};
use pubsub_listener::protocol::ProtocolError;

/// Upper bound for any single step of a test.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Directory with the bundled static page.
pub fn public_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("public")
}

/// WebSocket endpoint URL for a server bound to `addr`.
pub fn websocket_url(addr: SocketAddr) -> String {
    format!("ws://{addr}{WEBSOCKET_PATH}")
}

/// Starts a running node with join/leave pushes on an ephemeral port.
pub async fn start_node(handler: impl NodeHandler) -> Result<(Node, SocketAddr)> {
    let node = Node::new(NodeConfig {
        join_leave: true,
        ..NodeConfig::default()
    })?;
    node.set_handler(handler)?;
    node.run()?;
    let addr = serve(node.clone()).await?;
    Ok((node, addr))
}

/// Serves `node` on an ephemeral port without starting it.
pub async fn serve(node: Node) -> Result<SocketAddr> {
    let router = build_router(node, public_dir(), "listening.server");
    let addr = spawn_server(SocketAddr::from(([127, 0, 0, 1], 0)), router)
        .await
        .context("bind test listener")?;
    Ok(addr)
}

/// Awaits `fut`, failing with `what` after [`STEP_TIMEOUT`].
pub async fn within<F: Future>(what: &str, fut: F) -> Result<F::Output> {
    timeout(STEP_TIMEOUT, fut)
        .await
        .with_context(|| format!("timed out {what}"))
}

/// Polls `check` until it returns `true`.
pub async fn eventually<F, Fut>(what: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    within(what, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

/// What the node hooks observed.
#[derive(Debug, Default)]
pub struct Recorded {
    /// Completed connects.
    pub connects: AtomicUsize,
    /// Accepted publications.
    pub publishes: AtomicUsize,
    /// Disconnect reasons, in order.
    pub disconnects: Mutex<Vec<u16>>,
    /// Users seen on connect.
    pub users: Mutex<Vec<String>>,
}

impl Recorded {
    /// Number of disconnects seen so far.
    pub fn disconnect_count(&self) -> usize {
        self.disconnects.lock().map_or(0, |d| d.len())
    }
}

/// Node hooks that record calls, echo RPC payloads and refuse one channel.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    /// Shared record of hook calls.
    pub recorded: Arc<Recorded>,
    /// Subscriptions to this channel are refused with permission denied.
    pub forbidden: Option<String>,
}

impl NodeHandler for RecordingHandler {
    fn on_connect(&self, client: &ClientSession) {
        self.recorded.connects.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut users) = self.recorded.users.lock() {
            users.push(client.user().to_string());
        }
    }

    fn on_subscribe(
        &self,
        _client: &ClientSession,
        event: &SubscribeEvent,
    ) -> Result<(), ProtocolError> {
        if self.forbidden.as_deref() == Some(event.channel.as_str()) {
            return Err(ProtocolError::permission_denied());
        }
        Ok(())
    }

    fn on_publish(
        &self,
        _client: &ClientSession,
        _event: &PublishEvent,
    ) -> Result<(), ProtocolError> {
        self.recorded.publishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_rpc(&self, _client: &ClientSession, event: &RpcEvent) -> Result<RpcReply, ProtocolError> {
        Ok(RpcReply {
            data: event.data.clone(),
        })
    }

    fn on_disconnect(&self, _client: &ClientSession, event: &DisconnectEvent) {
        if let Ok(mut disconnects) = self.recorded.disconnects.lock() {
            disconnects.push(event.disconnect.code);
        }
    }
}
