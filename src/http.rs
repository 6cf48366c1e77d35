//! HTTP front door: route composition and server startup.

use std::net::SocketAddr;
use std::path::Path;

use axum::extract::Extension;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::anonymous_auth;
use crate::node::Node;
use crate::transport::websocket_handler;

/// Path of the real-time endpoint.
pub const WEBSOCKET_PATH: &str = "/connection/websocket";

/// Path the browser page reads [`DemoInfo`] from.
pub const DEMO_INFO_PATH: &str = "/api/demo";

/// Demo settings exposed to the browser page.
#[derive(Debug, Clone, Serialize)]
pub struct DemoInfo {
    /// Channel the listening clients subscribe to.
    pub channel: String,
}

/// `GET /api/demo`: current demo settings.
async fn demo_info(Extension(info): Extension<DemoInfo>) -> Json<DemoInfo> {
    Json(info)
}

/// Builds the router: the authenticated WebSocket endpoint, the demo
/// settings for the browser page and a static file fallback rooted at
/// `public_dir`.
pub fn build_router(
    node: Node,
    public_dir: impl AsRef<Path>,
    channel: impl Into<String>,
) -> Router {
    let info = DemoInfo {
        channel: channel.into(),
    };
    Router::new()
        .route(
            WEBSOCKET_PATH,
            get(websocket_handler).layer(from_fn(anonymous_auth)),
        )
        .route(DEMO_INFO_PATH, get(demo_info).layer(Extension(info)))
        .fallback_service(ServeDir::new(public_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(node)
}

/// Binds `addr` and serves `router` on a background task.
///
/// Bind failures are returned to the caller. If the server later fails,
/// the error is logged and the process exits with status 1.
///
/// # Errors
///
/// Returns the I/O error if the listener cannot be bound.
pub async fn spawn_server(addr: SocketAddr, router: Router) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "starting server, visit http://{local_addr}");

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            tracing::error!(error = %err, "http server failed");
            std::process::exit(1);
        }
    });
    Ok(local_addr)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::node::NodeConfig;

    fn public_dir() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("public")
    }

    fn router() -> Router {
        let Ok(node) = Node::new(NodeConfig::default()) else {
            panic!("node construction failed");
        };
        build_router(node, public_dir(), "alerts")
    }

    #[tokio::test]
    async fn serves_index_for_root() {
        let Ok(request) = Request::builder().uri("/").body(Body::empty()) else {
            panic!("request build failed");
        };
        let Ok(response) = router().oneshot(request).await else {
            panic!("request failed");
        };
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn demo_info_reports_channel() {
        let Ok(request) = Request::builder().uri(DEMO_INFO_PATH).body(Body::empty()) else {
            panic!("request build failed");
        };
        let Ok(response) = router().oneshot(request).await else {
            panic!("request failed");
        };
        assert_eq!(response.status(), StatusCode::OK);
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), 1024).await else {
            panic!("body read failed");
        };
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
            panic!("body is not json");
        };
        assert_eq!(body, serde_json::json!({"channel": "alerts"}));
    }

    #[tokio::test]
    async fn unknown_file_is_not_found() {
        let Ok(request) = Request::builder()
            .uri("/missing.txt")
            .body(Body::empty())
        else {
            panic!("request build failed");
        };
        let Ok(response) = router().oneshot(request).await else {
            panic!("request failed");
        };
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn plain_get_on_websocket_path_is_rejected() {
        let Ok(request) = Request::builder()
            .uri(WEBSOCKET_PATH)
            .body(Body::empty())
        else {
            panic!("request build failed");
        };
        let Ok(response) = router().oneshot(request).await else {
            panic!("request failed");
        };
        assert!(response.status().is_client_error());
    }
}
