//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single connection: the first command
//! must be `connect`, after which subscribe, unsubscribe, publish and rpc
//! commands are dispatched to the node and its hooks. Channel events reach
//! the socket through one forwarder task per subscription.

use std::collections::HashMap;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::auth::Credentials;
use crate::node::{
    ChannelEvent, ClientId, ClientSession, DisconnectEvent, LogLevel, Node, PublishEvent,
    RpcEvent, SubscribeEvent, TransportInfo,
};
use crate::protocol::{
    Command, ConnectRequest, ConnectResult, Disconnect, JoinLeave, Method, ProtocolError,
    Publication, PublishRequest, PublishResult, Push, PushKind, Reply, ReplyBody, RpcRequest,
    RpcResult, SubscribeResult, UnsubscribeResult,
};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and answers them in order.
/// - Forwards pushes from the connection's outbound queue to the client.
///
/// Returns when either side closes or a protocol violation occurs; hooks
/// see `on_disconnect` exactly once if `connect` had succeeded.
pub async fn run_connection(
    socket: WebSocket,
    node: Node,
    credentials: Credentials,
    transport: TransportInfo,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (push_tx, mut push_rx) = mpsc::channel(node.config().client_queue_size);
    let mut conn = Connection::new(node, credentials, transport, push_tx);
    let mut disconnect = Disconnect::connection_closed();

    loop {
        tokio::select! {
            // Incoming frame from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match conn.handle_frame(&text).await {
                            Ok(reply) => {
                                if send_reply(&mut ws_tx, &reply).await.is_err() {
                                    break;
                                }
                            }
                            Err(d) => {
                                let frame = CloseFrame {
                                    code: d.code,
                                    reason: d.reason.clone().into(),
                                };
                                let _ = ws_tx.send(Message::Close(Some(frame))).await;
                                disconnect = d;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(frame) = frame {
                            disconnect = Disconnect::new(frame.code, frame.reason.as_str());
                        }
                        break;
                    }
                    Some(Err(err)) => {
                        tracing::debug!(error = %err, "websocket read failed");
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }
            // Push for this client
            Some(push) = push_rx.recv() => {
                if send_reply(&mut ws_tx, &push).await.is_err() {
                    break;
                }
            }
        }
    }

    conn.close(disconnect).await;
}

async fn send_reply<S>(ws_tx: &mut S, reply: &Reply) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let json = serde_json::to_string(reply).map_err(|err| {
        tracing::error!(error = %err, "failed to encode reply");
    })?;
    ws_tx.send(Message::text(json)).await.map_err(|_| ())
}

/// Per-connection state.
struct Connection {
    node: Node,
    credentials: Credentials,
    transport: TransportInfo,
    session: Option<ClientSession>,
    subscriptions: HashMap<String, JoinHandle<()>>,
    push_tx: mpsc::Sender<Reply>,
}

impl Connection {
    fn new(
        node: Node,
        credentials: Credentials,
        transport: TransportInfo,
        push_tx: mpsc::Sender<Reply>,
    ) -> Self {
        Self {
            node,
            credentials,
            transport,
            session: None,
            subscriptions: HashMap::new(),
            push_tx,
        }
    }

    /// Parses and dispatches one text frame.
    ///
    /// Returns the reply to send, or the reason to drop the connection.
    async fn handle_frame(&mut self, text: &str) -> Result<Reply, Disconnect> {
        let command = serde_json::from_str::<Command>(text).map_err(|err| {
            tracing::debug!(error = %err, "malformed command");
            Disconnect::bad_request()
        })?;
        if command.id == 0 {
            return Err(Disconnect::bad_request());
        }
        if self.node.log_enabled(LogLevel::Debug) {
            tracing::debug!(id = command.id, method = command.method.name(), "command");
        }

        let id = command.id;
        let body = match (command.method, self.session.clone()) {
            (Method::Connect(req), None) => self.connect(req).await,
            (Method::Connect(_), Some(_)) | (_, None) => return Err(Disconnect::bad_request()),
            (Method::Subscribe(req), Some(session)) => self.subscribe(&session, req.channel).await,
            (Method::Unsubscribe(req), Some(session)) => {
                self.unsubscribe(&session, &req.channel).await
            }
            (Method::Publish(req), Some(session)) => self.publish(&session, req).await,
            (Method::Rpc(req), Some(session)) => self.rpc(&session, req),
        };
        Ok(Reply::new(id, body.unwrap_or_else(ReplyBody::Error)))
    }

    async fn connect(&mut self, req: ConnectRequest) -> Result<ReplyBody, ProtocolError> {
        let session = ClientSession::new(
            ClientId::new(),
            self.credentials.user_id.clone(),
            req.name,
            req.version,
            self.transport,
        );
        self.node
            .hub()
            .add(session.id(), self.push_tx.clone())
            .await;
        if self.node.log_enabled(LogLevel::Debug) {
            tracing::debug!(client = %session.id(), user = session.user(), "client connected");
        }
        self.node.handler().on_connect(&session);

        let result = ConnectResult {
            client: session.id().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        self.session = Some(session);
        Ok(ReplyBody::Connect(result))
    }

    async fn subscribe(
        &mut self,
        session: &ClientSession,
        channel: String,
    ) -> Result<ReplyBody, ProtocolError> {
        if channel.is_empty() {
            return Err(ProtocolError::bad_request());
        }
        if self.subscriptions.contains_key(&channel) {
            return Err(ProtocolError::already_subscribed());
        }
        let event = SubscribeEvent {
            channel: channel.clone(),
        };
        self.node.handler().on_subscribe(session, &event)?;

        let rx = self.node.broker().subscribe(&channel).await;
        let forwarder = tokio::spawn(forward_channel(
            channel.clone(),
            rx,
            self.push_tx.clone(),
        ));
        self.subscriptions.insert(channel.clone(), forwarder);

        if self.node.config().join_leave {
            self.node
                .broker()
                .publish(&channel, ChannelEvent::Join(session.info()))
                .await;
        }
        Ok(ReplyBody::Subscribe(SubscribeResult::default()))
    }

    async fn unsubscribe(
        &mut self,
        session: &ClientSession,
        channel: &str,
    ) -> Result<ReplyBody, ProtocolError> {
        let Some(forwarder) = self.subscriptions.remove(channel) else {
            return Err(ProtocolError::not_subscribed());
        };
        self.leave(session, channel, forwarder).await;
        Ok(ReplyBody::Unsubscribe(UnsubscribeResult::default()))
    }

    async fn publish(
        &mut self,
        session: &ClientSession,
        req: PublishRequest,
    ) -> Result<ReplyBody, ProtocolError> {
        if req.channel.is_empty() {
            return Err(ProtocolError::bad_request());
        }
        let event = PublishEvent {
            channel: req.channel,
            data: req.data,
        };
        self.node.handler().on_publish(session, &event)?;

        let delivered = self
            .node
            .broker()
            .publish(
                &event.channel,
                ChannelEvent::Publication(Publication {
                    data: event.data,
                    info: Some(session.info()),
                }),
            )
            .await;
        if self.node.log_enabled(LogLevel::Debug) {
            tracing::debug!(channel = %event.channel, delivered, "publication");
        }
        Ok(ReplyBody::Publish(PublishResult::default()))
    }

    fn rpc(&self, session: &ClientSession, req: RpcRequest) -> Result<ReplyBody, ProtocolError> {
        let event = RpcEvent {
            method: req.method,
            data: req.data,
        };
        let reply = self.node.handler().on_rpc(session, &event)?;
        Ok(ReplyBody::Rpc(RpcResult { data: reply.data }))
    }

    /// Stops a channel forwarder and announces the leave.
    async fn leave(&self, session: &ClientSession, channel: &str, forwarder: JoinHandle<()>) {
        forwarder.abort();
        // Wait for the aborted task so its receiver is dropped before release.
        let _ = forwarder.await;
        if self.node.config().join_leave {
            self.node
                .broker()
                .publish(channel, ChannelEvent::Leave(session.info()))
                .await;
        }
        self.node.broker().release(channel).await;
    }

    /// Tears the connection down and runs the disconnect hook.
    async fn close(mut self, disconnect: Disconnect) {
        let subscriptions = std::mem::take(&mut self.subscriptions);
        let Some(session) = self.session.take() else {
            for (_, forwarder) in subscriptions {
                forwarder.abort();
            }
            tracing::debug!(%disconnect, "connection closed before connect");
            return;
        };
        for (channel, forwarder) in subscriptions {
            self.leave(&session, &channel, forwarder).await;
        }
        self.node.hub().remove(session.id()).await;
        if self.node.log_enabled(LogLevel::Debug) {
            tracing::debug!(client = %session.id(), %disconnect, "client disconnected");
        }
        self.node
            .handler()
            .on_disconnect(&session, &DisconnectEvent { disconnect });
    }
}

/// Moves channel events into a connection's outbound queue.
async fn forward_channel(
    channel: String,
    mut rx: broadcast::Receiver<ChannelEvent>,
    push_tx: mpsc::Sender<Reply>,
) {
    loop {
        let kind = match rx.recv().await {
            Ok(ChannelEvent::Publication(publication)) => PushKind::Publication(publication),
            Ok(ChannelEvent::Join(info)) => PushKind::Join(JoinLeave { info }),
            Ok(ChannelEvent::Leave(info)) => PushKind::Leave(JoinLeave { info }),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(channel = %channel, lagged = n, "subscriber lagged behind channel");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let push = Reply::push(Push {
            channel: channel.clone(),
            kind,
        });
        if push_tx.send(push).await.is_err() {
            break;
        }
    }
}
