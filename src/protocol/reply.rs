//! Server → client replies and pushes.

use serde::{Deserialize, Serialize};

use super::ProtocolError;

/// A single reply frame.
///
/// `id` matches the command being answered; pushes carry `id == 0`, which
/// is omitted on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Correlation id, `0` for pushes.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: u32,
    /// Result, error or push payload.
    #[serde(flatten)]
    pub body: ReplyBody,
}

fn is_zero(id: &u32) -> bool {
    *id == 0
}

impl Reply {
    /// Creates a reply to command `id`.
    #[must_use]
    pub const fn new(id: u32, body: ReplyBody) -> Self {
        Self { id, body }
    }

    /// Creates an error reply to command `id`.
    #[must_use]
    pub const fn error(id: u32, error: ProtocolError) -> Self {
        Self::new(id, ReplyBody::Error(error))
    }

    /// Creates an unsolicited push.
    #[must_use]
    pub const fn push(push: Push) -> Self {
        Self::new(0, ReplyBody::Push(push))
    }
}

/// Reply payload, tagged by the method it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyBody {
    /// Connect accepted.
    Connect(ConnectResult),
    /// Subscription active.
    Subscribe(SubscribeResult),
    /// Subscription removed.
    Unsubscribe(UnsubscribeResult),
    /// Publication accepted.
    Publish(PublishResult),
    /// RPC result.
    Rpc(RpcResult),
    /// Command refused.
    Error(ProtocolError),
    /// Server-initiated frame.
    Push(Push),
}

/// Result of a `connect` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectResult {
    /// Id the node assigned to this connection.
    pub client: String,
    /// Node version.
    #[serde(default)]
    pub version: String,
}

/// Result of a `subscribe` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeResult {}

/// Result of an `unsubscribe` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeResult {}

/// Result of a `publish` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {}

/// Result of an `rpc` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResult {
    /// Procedure output; `null` when the handler computed nothing.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

/// Identity of the client that caused a push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Connection id.
    pub client: String,
    /// User id; empty for anonymous users.
    #[serde(default)]
    pub user: String,
}

/// Server-initiated frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Push {
    /// Channel the push belongs to; empty for connection-level pushes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel: String,
    /// What happened.
    #[serde(flatten)]
    pub kind: PushKind,
}

/// Kinds of push frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushKind {
    /// New publication in a subscribed channel.
    #[serde(rename = "pub")]
    Publication(Publication),
    /// A client subscribed to the channel.
    Join(JoinLeave),
    /// A client left the channel.
    Leave(JoinLeave),
    /// Asynchronous message addressed to this connection only.
    Message(MessagePush),
}

/// Data published into a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    /// Payload, verbatim.
    pub data: serde_json::Value,
    /// Publisher; absent for server-side publications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ClientInfo>,
}

/// Payload of join and leave pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinLeave {
    /// The client that joined or left.
    pub info: ClientInfo,
}

/// Payload of a message push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePush {
    /// Payload, verbatim.
    pub data: serde_json::Value,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn push_omits_id() {
        let reply = Reply::push(Push {
            channel: "news".to_string(),
            kind: PushKind::Publication(Publication {
                data: serde_json::json!({"n": 1}),
                info: None,
            }),
        });
        let Ok(json) = serde_json::to_value(&reply) else {
            panic!("serialize failed");
        };
        assert_eq!(
            json,
            serde_json::json!({"push": {"channel": "news", "pub": {"data": {"n": 1}}}})
        );
    }

    #[test]
    fn error_reply_wire_shape() {
        let reply = Reply::error(4, ProtocolError::already_subscribed());
        let Ok(json) = serde_json::to_value(&reply) else {
            panic!("serialize failed");
        };
        assert_eq!(
            json,
            serde_json::json!({"id": 4, "error": {"code": 105, "message": "already subscribed"}})
        );
    }

    #[test]
    fn parses_join_push() {
        let raw = r#"{"push":{"channel":"c","join":{"info":{"client":"abc","user":""}}}}"#;
        let Ok(reply) = serde_json::from_str::<Reply>(raw) else {
            panic!("parse failed");
        };
        assert_eq!(reply.id, 0);
        let ReplyBody::Push(push) = reply.body else {
            panic!("expected push");
        };
        assert_eq!(push.channel, "c");
        let PushKind::Join(join) = push.kind else {
            panic!("expected join");
        };
        assert_eq!(join.info.client, "abc");
    }

    #[test]
    fn parses_message_push_without_channel() {
        let raw = r#"{"push":{"message":{"data":"ping"}}}"#;
        let Ok(reply) = serde_json::from_str::<Reply>(raw) else {
            panic!("parse failed");
        };
        let ReplyBody::Push(push) = reply.body else {
            panic!("expected push");
        };
        assert!(push.channel.is_empty());
        assert!(matches!(push.kind, PushKind::Message(_)));
    }

    #[test]
    fn empty_rpc_result_serializes_as_empty_object() {
        let reply = Reply::new(3, ReplyBody::Rpc(RpcResult::default()));
        let Ok(json) = serde_json::to_string(&reply) else {
            panic!("serialize failed");
        };
        assert_eq!(json, r#"{"id":3,"rpc":{}}"#);
    }
}
