//! Client-side channel subscription.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use super::connection::ReplySink;
use super::events::{
    JoinEvent, LeaveEvent, PublicationEvent, SubscribedEvent, SubscribingEvent,
    SubscriptionErrorEvent, UnsubscribedEvent,
};
use super::{Client, ClientInner, lock};
use crate::error::ClientError;
use crate::protocol::{Method, ProtocolError, SubscribeRequest, UnsubscribeRequest};

/// Subscription lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Idle; [`Subscription::subscribe`] may be called.
    Unsubscribed,
    /// Waiting for the server's answer.
    Subscribing,
    /// Receiving channel pushes.
    Subscribed,
}

type Hook<E> = Arc<dyn Fn(E) + Send + Sync>;

#[derive(Default)]
struct SubscriptionHooks {
    subscribing: Option<Hook<SubscribingEvent>>,
    subscribed: Option<Hook<SubscribedEvent>>,
    unsubscribed: Option<Hook<UnsubscribedEvent>>,
    error: Option<Hook<SubscriptionErrorEvent>>,
    publication: Option<Hook<PublicationEvent>>,
    join: Option<Hook<JoinEvent>>,
    leave: Option<Hook<LeaveEvent>>,
}

struct SubscriptionInner {
    channel: String,
    client: Weak<ClientInner>,
    state: Mutex<SubscriptionState>,
    hooks: Mutex<SubscriptionHooks>,
}

/// A client's subscription to one channel. Clones share state.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.inner.channel)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub(crate) fn new(channel: &str, client: Weak<ClientInner>) -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                channel: channel.to_string(),
                client,
                state: Mutex::new(SubscriptionState::Unsubscribed),
                hooks: Mutex::new(SubscriptionHooks::default()),
            }),
        }
    }

    /// Channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        *lock(&self.inner.state)
    }

    /// Called when `subscribe` sends the request.
    pub fn on_subscribing(&self, hook: impl Fn(SubscribingEvent) + Send + Sync + 'static) {
        lock(&self.inner.hooks).subscribing = Some(Arc::new(hook));
    }

    /// Called when the server confirms the subscription.
    pub fn on_subscribed(&self, hook: impl Fn(SubscribedEvent) + Send + Sync + 'static) {
        lock(&self.inner.hooks).subscribed = Some(Arc::new(hook));
    }

    /// Called when the subscription ends.
    pub fn on_unsubscribed(&self, hook: impl Fn(UnsubscribedEvent) + Send + Sync + 'static) {
        lock(&self.inner.hooks).unsubscribed = Some(Arc::new(hook));
    }

    /// Called when the server refuses a subscription command.
    pub fn on_error(&self, hook: impl Fn(SubscriptionErrorEvent) + Send + Sync + 'static) {
        lock(&self.inner.hooks).error = Some(Arc::new(hook));
    }

    /// Called for each publication in the channel.
    pub fn on_publication(&self, hook: impl Fn(PublicationEvent) + Send + Sync + 'static) {
        lock(&self.inner.hooks).publication = Some(Arc::new(hook));
    }

    /// Called when a client joins the channel.
    pub fn on_join(&self, hook: impl Fn(JoinEvent) + Send + Sync + 'static) {
        lock(&self.inner.hooks).join = Some(Arc::new(hook));
    }

    /// Called when a client leaves the channel.
    pub fn on_leave(&self, hook: impl Fn(LeaveEvent) + Send + Sync + 'static) {
        lock(&self.inner.hooks).leave = Some(Arc::new(hook));
    }

    /// Sends the subscribe request. The outcome arrives as a `subscribed`
    /// or `error` event.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AlreadySubscribed`] unless unsubscribed.
    /// - [`ClientError::NotConnected`] if the client is not connected.
    pub fn subscribe(&self) -> Result<(), ClientError> {
        let client = self.client()?;
        {
            let mut state = lock(&self.inner.state);
            if *state != SubscriptionState::Unsubscribed {
                return Err(ClientError::AlreadySubscribed(self.inner.channel.clone()));
            }
            *state = SubscriptionState::Subscribing;
        }
        self.emit(
            |h| h.subscribing.clone(),
            SubscribingEvent {
                reason: "subscribe called".to_string(),
            },
        );

        let request = SubscribeRequest {
            channel: self.inner.channel.clone(),
        };
        let sink = ReplySink::Subscribe(self.inner.channel.clone());
        if let Err(err) = client.send(Method::Subscribe(request), sink) {
            *lock(&self.inner.state) = SubscriptionState::Unsubscribed;
            return Err(err);
        }
        Ok(())
    }

    /// Leaves the channel. A no-op when already unsubscribed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the client is not connected.
    pub fn unsubscribe(&self) -> Result<(), ClientError> {
        if self.state() == SubscriptionState::Unsubscribed {
            return Ok(());
        }
        let client = self.client()?;
        let request = UnsubscribeRequest {
            channel: self.inner.channel.clone(),
        };
        let sink = ReplySink::Unsubscribe(self.inner.channel.clone());
        client.send(Method::Unsubscribe(request), sink)?;
        self.reset("unsubscribe called");
        Ok(())
    }

    /// Publishes into this subscription's channel.
    ///
    /// # Errors
    ///
    /// Same as [`Client::publish`].
    pub async fn publish(&self, data: serde_json::Value) -> Result<(), ClientError> {
        self.client()?.publish(&self.inner.channel, data).await
    }

    fn client(&self) -> Result<Client, ClientError> {
        self.inner
            .client
            .upgrade()
            .map(Client::from_inner)
            .ok_or(ClientError::Closed)
    }

    pub(crate) fn mark_subscribed(&self) {
        {
            let mut state = lock(&self.inner.state);
            if *state != SubscriptionState::Subscribing {
                return;
            }
            *state = SubscriptionState::Subscribed;
        }
        self.emit(|h| h.subscribed.clone(), SubscribedEvent::default());
    }

    /// Subscribe was refused; fall back to unsubscribed.
    pub(crate) fn mark_failed(&self, error: ProtocolError) {
        {
            let mut state = lock(&self.inner.state);
            if *state == SubscriptionState::Subscribing {
                *state = SubscriptionState::Unsubscribed;
            }
        }
        self.emit(|h| h.error.clone(), SubscriptionErrorEvent { error });
    }

    /// Moves to unsubscribed, firing `unsubscribed` if it was active.
    pub(crate) fn reset(&self, reason: &str) {
        let previous = std::mem::replace(
            &mut *lock(&self.inner.state),
            SubscriptionState::Unsubscribed,
        );
        if previous != SubscriptionState::Unsubscribed {
            self.emit(
                |h| h.unsubscribed.clone(),
                UnsubscribedEvent {
                    reason: reason.to_string(),
                },
            );
        }
    }

    pub(crate) fn emit_publication(&self, event: PublicationEvent) {
        if self.state() == SubscriptionState::Subscribed {
            self.emit(|h| h.publication.clone(), event);
        }
    }

    pub(crate) fn emit_join(&self, event: JoinEvent) {
        if self.state() == SubscriptionState::Subscribed {
            self.emit(|h| h.join.clone(), event);
        }
    }

    pub(crate) fn emit_leave(&self, event: LeaveEvent) {
        if self.state() == SubscriptionState::Subscribed {
            self.emit(|h| h.leave.clone(), event);
        }
    }

    fn emit<E>(&self, pick: impl FnOnce(&SubscriptionHooks) -> Option<Hook<E>>, event: E) {
        let hook = pick(&lock(&self.inner.hooks));
        if let Some(hook) = hook {
            hook(event);
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn detached(channel: &str) -> Subscription {
        Subscription::new(channel, Weak::new())
    }

    #[test]
    fn subscribe_without_client_fails() {
        let sub = detached("news");
        assert!(matches!(sub.subscribe(), Err(ClientError::Closed)));
        assert_eq!(sub.state(), SubscriptionState::Unsubscribed);
    }

    #[test]
    fn publications_only_flow_when_subscribed() {
        let sub = detached("news");
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        sub.on_publication(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let event = || PublicationEvent {
            data: serde_json::json!(1),
            info: None,
        };

        sub.emit_publication(event());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        *lock(&sub.inner.state) = SubscriptionState::Subscribing;
        sub.mark_subscribed();
        sub.emit_publication(event());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refusal_returns_to_unsubscribed_and_reports() {
        let sub = detached("news");
        let errors = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&errors);
        sub.on_error(move |e| {
            assert_eq!(e.error.code, 103);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        *lock(&sub.inner.state) = SubscriptionState::Subscribing;
        sub.mark_failed(ProtocolError::permission_denied());
        assert_eq!(sub.state(), SubscriptionState::Unsubscribed);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_fires_unsubscribed_once() {
        let sub = detached("news");
        let fired = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&fired);
        sub.on_unsubscribed(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        *lock(&sub.inner.state) = SubscriptionState::Subscribed;
        sub.reset("test");
        sub.reset("test");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
