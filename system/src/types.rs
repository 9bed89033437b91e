use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Server-assigned identity of one live WebSocket connection.
pub type ConnectionId = uuid::Uuid;

/// One unit of freehand or shape drawing data. The server never looks inside.
pub type DrawingEvent = serde_json::Value;

/// Everyone currently on the board, keyed by their connection.
pub type ActiveUsers = HashMap<ConnectionId, Participant>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ConnectionId,
    pub name: String,
    pub color: String,
}

/// Payload of `user-join`. Both fields are optional and anything that is not
/// a string is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl JoinRequest {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            color: Some(color.into()),
        }
    }

    pub fn from_value(value: &serde_json::Value) -> Self {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_owned())
        };
        Self {
            name: field("name"),
            color: field("color"),
        }
    }
}
