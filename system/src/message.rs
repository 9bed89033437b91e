use crate::{ActiveUsers, ConnectionId, DrawingEvent, JoinRequest, Participant};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
}

/// Frames sent by clients. On the wire every frame is
/// `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    UserJoin(JoinRequest),
    Draw(DrawingEvent),
    DrawShape(DrawingEvent),
    Erase(DrawingEvent),
    ClearBoard,
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    DrawingHistory(Vec<DrawingEvent>),
    ActiveUsers(ActiveUsers),
    UserJoined(Participant),
    UserLeft(ConnectionId),
    Draw(DrawingEvent),
    DrawShape(DrawingEvent),
    Erase(DrawingEvent),
    ClearBoard,
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl ClientMessage {
    /// Builds a message from its event name and raw payload. Payloads are
    /// opaque except for `user-join`, whose fields fall back to absent
    /// instead of failing.
    pub fn from_parts(event: &str, data: serde_json::Value) -> Result<Self, CodecError> {
        match event {
            "user-join" => Ok(ClientMessage::UserJoin(JoinRequest::from_value(&data))),
            "draw" => Ok(ClientMessage::Draw(data)),
            "draw-shape" => Ok(ClientMessage::DrawShape(data)),
            "erase" => Ok(ClientMessage::Erase(data)),
            "clear-board" => Ok(ClientMessage::ClearBoard),
            other => Err(CodecError::UnknownEvent(other.to_owned())),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::UserJoin(_) => "user-join",
            ClientMessage::Draw(_) => "draw",
            ClientMessage::DrawShape(_) => "draw-shape",
            ClientMessage::Erase(_) => "erase",
            ClientMessage::ClearBoard => "clear-board",
        }
    }
}

impl<'de> Deserialize<'de> for ClientMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Envelope { event, data } = Envelope::deserialize(deserializer)?;
        ClientMessage::from_parts(&event, data).map_err(de::Error::custom)
    }
}

impl ServerMessage {
    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::DrawingHistory(_) => "drawing-history",
            ServerMessage::ActiveUsers(_) => "active-users",
            ServerMessage::UserJoined(_) => "user-joined",
            ServerMessage::UserLeft(_) => "user-left",
            ServerMessage::Draw(_) => "draw",
            ServerMessage::DrawShape(_) => "draw-shape",
            ServerMessage::Erase(_) => "erase",
            ServerMessage::ClearBoard => "clear-board",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_falls_back_on_malformed_join_payload() {
        let message = ClientMessage::from_json(r#"{"event":"user-join","data":{"name":7}}"#)
            .expect("");
        assert_eq!(message, ClientMessage::UserJoin(JoinRequest::default()));

        let message = ClientMessage::from_json(r#"{"event":"user-join"}"#).expect("");
        assert_eq!(message, ClientMessage::UserJoin(JoinRequest::default()));
    }

    #[test]
    fn it_keeps_draw_payload_untouched() {
        let payload = json!({"x0": 1, "y0": 2.5, "tool": {"kind": "pen", "width": 3}});
        let text = json!({"event": "draw", "data": payload.clone()}).to_string();
        assert_eq!(
            ClientMessage::from_json(&text).expect(""),
            ClientMessage::Draw(payload)
        );
    }

    #[test]
    fn it_rejects_unknown_event() {
        let err = ClientMessage::from_json(r#"{"event":"paint","data":{}}"#).unwrap_err();
        assert!(err.to_string().contains("paint"));
    }
}
