//! WebSocket transport: upgrade handler and per-connection loop.
//!
//! The endpoint at `/connection/websocket` speaks the JSON protocol from
//! [`crate::protocol`] and hands every accepted command to the [`crate::node::Node`].

pub mod connection;
pub mod handler;

pub use handler::websocket_handler;
