//! Connection authentication.
//!
//! There is no session backend: [`anonymous_auth`] attaches anonymous
//! [`Credentials`] to every upgrade request before the WebSocket handshake.
//! Whether anonymous users may connect is decided here; this middleware
//! lets everyone in.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Identity attached to an upgrade request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// User id; empty for anonymous users.
    pub user_id: String,
}

impl Credentials {
    /// Credentials of an anonymous user.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Middleware inserting anonymous [`Credentials`] into the request
/// extensions, replacing whatever was there.
pub async fn anonymous_auth(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(Credentials::anonymous());
    next.run(request).await
}
