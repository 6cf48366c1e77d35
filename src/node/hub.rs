//! Registry of connected clients.
//!
//! Each connection registers its outbound queue after a successful
//! `connect`, so the node can address a single client with a message push.

use std::collections::HashMap;

use tokio::sync::{RwLock, mpsc};

use super::ClientId;
use crate::protocol::Reply;

/// Connected clients keyed by id.
#[derive(Debug, Default)]
pub struct Hub {
    clients: RwLock<HashMap<ClientId, mpsc::Sender<Reply>>>,
}

impl Hub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client's outbound queue.
    pub async fn add(&self, id: ClientId, outbound: mpsc::Sender<Reply>) {
        self.clients.write().await.insert(id, outbound);
    }

    /// Removes a client. Returns `true` if it was present.
    pub async fn remove(&self, id: ClientId) -> bool {
        self.clients.write().await.remove(&id).is_some()
    }

    /// Outbound queue of a connected client.
    pub async fn get(&self, id: ClientId) -> Option<mpsc::Sender<Reply>> {
        self.clients.read().await.get(&id).cloned()
    }

    /// Number of connected clients.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Returns `true` if nobody is connected.
    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_get_remove() {
        let hub = Hub::new();
        let id = ClientId::new();
        let (tx, _rx) = mpsc::channel(4);

        hub.add(id, tx).await;
        assert_eq!(hub.len().await, 1);
        assert!(hub.get(id).await.is_some());
        assert!(hub.get(ClientId::new()).await.is_none());

        assert!(hub.remove(id).await);
        assert!(!hub.remove(id).await);
        assert!(hub.is_empty().await);
    }
}
