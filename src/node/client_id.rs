//! Type-safe connection identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier the node assigns to each connected client.
///
/// Wraps a UUID v4 generated when the `connect` command is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(uuid::Uuid);

impl ClientId {
    /// Creates a new random `ClientId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ClientId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(ClientId::new(), ClientId::new());
    }

    #[test]
    fn parses_its_own_display() {
        let id = ClientId::new();
        let Ok(parsed) = id.to_string().parse::<ClientId>() else {
            panic!("parse failed");
        };
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_garbage() {
        assert!("not-a-uuid".parse::<ClientId>().is_err());
    }
}
