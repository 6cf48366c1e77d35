//! Client → server commands.

use serde::{Deserialize, Serialize};

/// A single command frame: a correlation id plus exactly one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Correlation id echoed by the reply. Must be non-zero.
    pub id: u32,
    /// The requested operation.
    #[serde(flatten)]
    pub method: Method,
}

/// Operations a client can request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Handshake; must be the first command on a connection.
    Connect(ConnectRequest),
    /// Start receiving a channel's publications.
    Subscribe(SubscribeRequest),
    /// Stop receiving a channel's publications.
    Unsubscribe(UnsubscribeRequest),
    /// Publish data into a channel.
    Publish(PublishRequest),
    /// Call a named server-side procedure.
    Rpc(RpcRequest),
}

impl Method {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
            Self::Publish(_) => "publish",
            Self::Rpc(_) => "rpc",
        }
    }
}

/// Payload of the `connect` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// Client application name.
    #[serde(default)]
    pub name: String,
    /// Client application version.
    #[serde(default)]
    pub version: String,
}

/// Payload of the `subscribe` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Channel to subscribe to.
    pub channel: String,
}

/// Payload of the `unsubscribe` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    /// Channel to leave.
    pub channel: String,
}

/// Payload of the `publish` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Target channel.
    pub channel: String,
    /// Arbitrary JSON payload, delivered verbatim.
    pub data: serde_json::Value,
}

/// Payload of the `rpc` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Procedure name.
    pub method: String,
    /// Arbitrary JSON arguments.
    #[serde(default)]
    pub data: serde_json::Value,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_command_wire_shape() {
        let cmd = Command {
            id: 2,
            method: Method::Subscribe(SubscribeRequest {
                channel: "news".to_string(),
            }),
        };
        let Ok(json) = serde_json::to_value(&cmd) else {
            panic!("serialize failed");
        };
        assert_eq!(json, serde_json::json!({"id": 2, "subscribe": {"channel": "news"}}));
    }

    #[test]
    fn parses_publish_with_object_payload() {
        let raw = r#"{"id":7,"publish":{"channel":"news","data":{"text":"hi"}}}"#;
        let Ok(cmd) = serde_json::from_str::<Command>(raw) else {
            panic!("parse failed");
        };
        assert_eq!(cmd.id, 7);
        let Method::Publish(req) = cmd.method else {
            panic!("expected publish");
        };
        assert_eq!(req.channel, "news");
        assert_eq!(req.data["text"], "hi");
    }

    #[test]
    fn connect_fields_are_optional() {
        let Ok(cmd) = serde_json::from_str::<Command>(r#"{"id":1,"connect":{}}"#) else {
            panic!("parse failed");
        };
        assert_eq!(cmd.method, Method::Connect(ConnectRequest::default()));
        assert_eq!(cmd.method.name(), "connect");
    }

    #[test]
    fn rejects_unknown_method() {
        let parsed = serde_json::from_str::<Command>(r#"{"id":1,"history":{"channel":"x"}}"#);
        assert!(parsed.is_err());
    }
}
