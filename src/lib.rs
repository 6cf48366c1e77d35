//! # pubsub-listener
//!
//! A self-contained real-time publish/subscribe demo: a broker node serving
//! a JSON protocol over WebSocket, and a set of in-process clients that
//! connect to it, subscribe to a shared channel and log everything they
//! see.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, browser page)
//!     │
//!     ├── HTTP front door (http, auth)
//!     ├── WS transport (transport/)
//!     │
//!     ├── Node: Broker + Hub (node/)
//!     ├── Hooks (hooks)
//!     │
//!     └── Listening clients (client/, driver)
//! ```

pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod hooks;
pub mod http;
pub mod latch;
pub mod node;
pub mod protocol;
pub mod shutdown;
pub mod transport;
