//! In-memory channel broker.
//!
//! [`Broker`] keeps one [`tokio::sync::broadcast`] channel per active
//! channel name. Subscribers hold a receiver; publishing fans the event out
//! to every receiver of that channel. Channels are created on first
//! subscribe and dropped once their last receiver is gone.

use std::collections::HashMap;

use tokio::sync::{RwLock, broadcast};

use crate::protocol::{ClientInfo, Publication};

/// Something that happened in a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// New data published.
    Publication(Publication),
    /// A client subscribed.
    Join(ClientInfo),
    /// A client unsubscribed or disconnected.
    Leave(ClientInfo),
}

/// Channel name → broadcast sender.
///
/// When a receiver falls more than `capacity` events behind, the oldest
/// events are dropped for it and it observes a lag.
#[derive(Debug)]
pub struct Broker {
    channels: RwLock<HashMap<String, broadcast::Sender<ChannelEvent>>>,
    capacity: usize,
}

impl Broker {
    /// Creates an empty broker. `capacity` must be non-zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Returns a receiver for all future events on `channel`, creating the
    /// channel if needed.
    pub async fn subscribe(&self, channel: &str) -> broadcast::Receiver<ChannelEvent> {
        let mut map = self.channels.write().await;
        map.entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Sends `event` to every subscriber of `channel`.
    ///
    /// Returns the number of receivers reached; `0` when nobody listens.
    pub async fn publish(&self, channel: &str, event: ChannelEvent) -> usize {
        let map = self.channels.read().await;
        map.get(channel)
            .map_or(0, |sender| sender.send(event).unwrap_or(0))
    }

    /// Drops `channel` if it has no receivers left.
    pub async fn release(&self, channel: &str) {
        let mut map = self.channels.write().await;
        if map
            .get(channel)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            map.remove(channel);
        }
    }

    /// Number of live receivers on `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let map = self.channels.read().await;
        map.get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of channels with at least one subscriber ever registered and
    /// not yet released.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn publication(n: u64) -> ChannelEvent {
        ChannelEvent::Publication(Publication {
            data: serde_json::json!({ "n": n }),
            info: None,
        })
    }

    #[tokio::test]
    async fn publish_without_subscribers_returns_zero() {
        let broker = Broker::new(16);
        assert_eq!(broker.publish("news", publication(1)).await, 0);
        assert_eq!(broker.channel_count().await, 0);
    }

    #[tokio::test]
    async fn subscribers_of_same_channel_receive_event() {
        let broker = Broker::new(16);
        let mut rx1 = broker.subscribe("news").await;
        let mut rx2 = broker.subscribe("news").await;
        let mut other = broker.subscribe("sport").await;

        assert_eq!(broker.publish("news", publication(1)).await, 2);

        let Ok(e1) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        let Ok(e2) = rx2.recv().await else {
            panic!("rx2 failed");
        };
        assert_eq!(e1, publication(1));
        assert_eq!(e1, e2);
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn release_drops_idle_channel_only() {
        let broker = Broker::new(16);
        let rx = broker.subscribe("news").await;
        let _keep = broker.subscribe("sport").await;
        assert_eq!(broker.subscriber_count("news").await, 1);

        broker.release("news").await;
        assert_eq!(broker.channel_count().await, 2);

        drop(rx);
        broker.release("news").await;
        broker.release("sport").await;
        assert_eq!(broker.channel_count().await, 1);
        assert_eq!(broker.subscriber_count("news").await, 0);
    }
}
