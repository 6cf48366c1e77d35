//! Demo orchestration: start the node and the HTTP server, connect the
//! listening clients, then wait for a termination signal.

use anyhow::Context;
use tracing::Instrument;

use crate::client::Client;
use crate::config::DemoConfig;
use crate::driver::listening_client;
use crate::hooks::LoggingHandler;
use crate::http::{build_router, spawn_server};
use crate::latch::CountdownLatch;
use crate::node::{Node, NodeConfig};
use crate::shutdown::wait_for_signal;

/// A running demo: node, bound address and connected clients.
#[derive(Debug)]
pub struct Demo {
    /// The broker node.
    pub node: Node,
    /// Address the HTTP server is listening on.
    pub local_addr: std::net::SocketAddr,
    /// The listening clients, all connected.
    pub clients: Vec<Client>,
}

/// Starts everything and returns once every client has connected.
///
/// # Errors
///
/// Fails if the node cannot be built or started, the listener cannot be
/// bound, or any client fails its initial connect.
pub async fn start(config: &DemoConfig) -> anyhow::Result<Demo> {
    let latch = CountdownLatch::new();

    let node = Node::new(NodeConfig {
        log_level: config.node_log_level,
        channel_capacity: config.channel_capacity,
        join_leave: true,
        ..NodeConfig::default()
    })
    .context("cannot create node")?;
    node.set_handler(LoggingHandler::new(latch.clone()))
        .context("cannot register node hooks")?;
    node.run().context("cannot start node")?;

    let router = build_router(node.clone(), &config.public_dir, config.channel.clone());
    let local_addr = spawn_server(config.listen_addr, router)
        .await
        .with_context(|| format!("cannot listen on {}", config.listen_addr))?;

    // Register every client before the first connect can count down.
    latch
        .add(config.client_count)
        .context("startup latch already released")?;

    let mut clients = Vec::with_capacity(config.client_count);
    for index in 0..config.client_count {
        let client = listening_client(index, config);
        client
            .connect()
            .instrument(tracing::info_span!("client", index))
            .await
            .with_context(|| format!("client {index} failed to connect"))?;
        clients.push(client);
    }

    tracing::info!(clients = config.client_count, "waiting for clients to connect");
    latch.wait().await;
    tracing::info!("all clients connected");

    Ok(Demo {
        node,
        local_addr,
        clients,
    })
}

/// Runs the demo until SIGINT or SIGTERM.
///
/// # Errors
///
/// Same as [`start`], plus a failure to install the signal handlers.
pub async fn run(config: DemoConfig) -> anyhow::Result<()> {
    let _demo = start(&config).await?;

    let signal = wait_for_signal()
        .await
        .context("cannot install signal handlers")?;
    tracing::info!(%signal, "received signal, exiting");
    Ok(())
}
