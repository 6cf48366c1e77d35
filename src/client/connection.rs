//! Connection task: owns the socket and the pending-reply table.
//!
//! The public [`Client`] API never touches the socket directly; it queues
//! [`Outbound`] items that this task numbers, writes, and later matches
//! against replies.

use std::collections::HashMap;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::Client;
use super::events::{DisconnectedEvent, JoinEvent, LeaveEvent, MessageEvent, PublicationEvent};
use crate::error::ClientError;
use crate::protocol::{Command, ConnectResult, Disconnect, Method, Push, PushKind, Reply, ReplyBody};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Work queued for the connection task.
pub(crate) enum Outbound {
    /// Send a command and route its reply to `sink`.
    Command { method: Method, sink: ReplySink },
    /// Close the socket; `done` is dropped once the task has finished.
    Close(oneshot::Sender<()>),
}

/// Where a reply goes once it arrives.
pub(crate) enum ReplySink {
    Connect(oneshot::Sender<Result<ConnectResult, ClientError>>),
    Subscribe(String),
    Unsubscribe(String),
    Publish(oneshot::Sender<Result<(), ClientError>>),
    Rpc(oneshot::Sender<Result<serde_json::Value, ClientError>>),
}

pub(crate) async fn run(
    stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    client: Client,
) {
    let (mut ws_tx, mut ws_rx) = stream.split();
    let mut pending: HashMap<u32, ReplySink> = HashMap::new();
    let mut next_id: u32 = 1;
    let mut close_ack = None;
    let mut disconnect = Disconnect::connection_closed();

    loop {
        tokio::select! {
            item = outbound.recv() => {
                match item {
                    Some(Outbound::Command { method, sink }) => {
                        let id = next_id;
                        next_id = next_id.checked_add(1).unwrap_or(1);
                        let json = match serde_json::to_string(&Command { id, method }) {
                            Ok(json) => json,
                            Err(err) => {
                                client.emit_error(format!("encode command: {err}"));
                                continue;
                            }
                        };
                        pending.insert(id, sink);
                        if let Err(err) = ws_tx.send(Message::text(json)).await {
                            client.emit_error(format!("write: {err}"));
                            break;
                        }
                    }
                    Some(Outbound::Close(done)) => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        disconnect = Disconnect::disconnect_called();
                        close_ack = Some(done);
                        break;
                    }
                    None => break,
                }
            }
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => handle_frame(&client, &mut pending, &text),
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(frame) = frame {
                            disconnect = Disconnect::new(u16::from(frame.code), frame.reason.as_str());
                        }
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        client.emit_error(format!("read: {err}"));
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Dropping the senders fails every waiting caller with `Closed`.
    drop(pending);
    tracing::debug!(%disconnect, "connection task finished");
    client.connection_closed(DisconnectedEvent {
        code: disconnect.code,
        reason: disconnect.reason,
    });
    drop(close_ack);
}

fn handle_frame(client: &Client, pending: &mut HashMap<u32, ReplySink>, text: &str) {
    let reply = match serde_json::from_str::<Reply>(text) {
        Ok(reply) => reply,
        Err(err) => {
            client.emit_error(format!("malformed reply: {err}"));
            return;
        }
    };
    if reply.id == 0 {
        if let ReplyBody::Push(push) = reply.body {
            handle_push(client, push);
        }
        return;
    }
    match pending.remove(&reply.id) {
        Some(sink) => resolve(client, sink, reply.body),
        None => tracing::debug!(id = reply.id, "reply for unknown command"),
    }
}

fn resolve(client: &Client, sink: ReplySink, body: ReplyBody) {
    match sink {
        ReplySink::Connect(tx) => {
            let result = match body {
                ReplyBody::Connect(result) => Ok(result),
                ReplyBody::Error(err) => Err(err.into()),
                _ => Err(ClientError::UnexpectedReply("connect")),
            };
            let _ = tx.send(result);
        }
        ReplySink::Subscribe(channel) => {
            let Some(sub) = client.get_subscription(&channel) else {
                return;
            };
            match body {
                ReplyBody::Subscribe(_) => sub.mark_subscribed(),
                ReplyBody::Error(err) => sub.mark_failed(err),
                _ => client.emit_error(ClientError::UnexpectedReply("subscribe").to_string()),
            }
        }
        ReplySink::Unsubscribe(channel) => {
            if let ReplyBody::Error(err) = body
                && let Some(sub) = client.get_subscription(&channel)
            {
                sub.mark_failed(err);
            }
        }
        ReplySink::Publish(tx) => {
            let result = match body {
                ReplyBody::Publish(_) => Ok(()),
                ReplyBody::Error(err) => Err(err.into()),
                _ => Err(ClientError::UnexpectedReply("publish")),
            };
            let _ = tx.send(result);
        }
        ReplySink::Rpc(tx) => {
            let result = match body {
                ReplyBody::Rpc(result) => Ok(result.data),
                ReplyBody::Error(err) => Err(err.into()),
                _ => Err(ClientError::UnexpectedReply("rpc")),
            };
            let _ = tx.send(result);
        }
    }
}

fn handle_push(client: &Client, push: Push) {
    let kind = match push.kind {
        PushKind::Message(message) => {
            client.emit_message(MessageEvent { data: message.data });
            return;
        }
        kind => kind,
    };
    let Some(sub) = client.get_subscription(&push.channel) else {
        tracing::debug!(channel = %push.channel, "push for unknown subscription");
        return;
    };
    match kind {
        PushKind::Publication(publication) => sub.emit_publication(PublicationEvent {
            data: publication.data,
            info: publication.info,
        }),
        PushKind::Join(join) => sub.emit_join(JoinEvent { info: join.info }),
        PushKind::Leave(leave) => sub.emit_leave(LeaveEvent { info: leave.info }),
        PushKind::Message(_) => {}
    }
}
