//! HTTP front door: static files and upgrade rejections.

mod common;

use std::net::SocketAddr;

use anyhow::{Result, bail};
use axum::Router;
use axum::routing::get;
use tokio_tungstenite::tungstenite;

use pubsub_listener::http::{WEBSOCKET_PATH, spawn_server};
use pubsub_listener::node::{Node, NodeConfig};
use pubsub_listener::transport::websocket_handler;

use common::{RecordingHandler, serve, start_node, websocket_url, within};

/// Dials `url` and returns the HTTP status of the refused upgrade.
async fn refused_status(url: String) -> Result<u16> {
    match within("dialing", tokio_tungstenite::connect_async(url)).await? {
        Err(tungstenite::Error::Http(response)) => Ok(response.status().as_u16()),
        Err(other) => bail!("unexpected dial error: {other}"),
        Ok(_) => bail!("upgrade unexpectedly accepted"),
    }
}

#[tokio::test]
async fn serves_static_page() -> Result<()> {
    let (_node, addr) = start_node(RecordingHandler::default()).await?;

    let index = reqwest::get(format!("http://{addr}/")).await?;
    assert_eq!(index.status(), reqwest::StatusCode::OK);
    let body = index.text().await?;
    assert!(body.contains(WEBSOCKET_PATH));

    let missing = reqwest::get(format!("http://{addr}/nope.js")).await?;
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn unknown_format_is_bad_request() -> Result<()> {
    let (_node, addr) = start_node(RecordingHandler::default()).await?;
    let url = format!("{}?format=protobuf", websocket_url(addr));
    assert_eq!(refused_status(url).await?, 400);
    Ok(())
}

#[tokio::test]
async fn stopped_node_is_unavailable() -> Result<()> {
    let node = Node::new(NodeConfig::default())?;
    let addr = serve(node).await?;
    assert_eq!(refused_status(websocket_url(addr)).await?, 503);
    Ok(())
}

#[tokio::test]
async fn missing_credentials_are_unauthorized() -> Result<()> {
    let node = Node::new(NodeConfig::default())?;
    node.run()?;
    // Same handler, without the anonymous credentials middleware.
    let router = Router::new()
        .route(WEBSOCKET_PATH, get(websocket_handler))
        .with_state(node);
    let addr = spawn_server(SocketAddr::from(([127, 0, 0, 1], 0)), router).await?;
    assert_eq!(refused_status(websocket_url(addr)).await?, 401);
    Ok(())
}
