use crate::game::input::parse_direction;
use crate::game::types::{Direction, GameSnapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
  Input { direction: Direction },
  Respawn,
  Rename { name: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum JsonClientMessage {
  Input { dir: Vec<i64> },
  Respawn,
  Rename { name: String },
}

/// Malformed frames, unknown types and invalid directions all decode to `None`.
pub fn decode_client_message(text: &str) -> Option<ClientMessage> {
  let message = serde_json::from_str::<JsonClientMessage>(text).ok()?;
  match message {
    JsonClientMessage::Input { dir } => {
      let direction = parse_direction(&dir)?;
      Some(ClientMessage::Input { direction })
    }
    JsonClientMessage::Respawn => Some(ClientMessage::Respawn),
    JsonClientMessage::Rename { name } => Some(ClientMessage::Rename { name }),
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardSize {
  pub width: i32,
  pub height: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitPayload {
  pub player_id: String,
  pub display_name: String,
  pub game_config: BoardSize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
  pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ServerMessage<'a> {
  Init(InitPayload),
  State(&'a GameSnapshot),
  Notification(NotificationPayload),
}

impl ServerMessage<'_> {
  pub fn encode(&self) -> serde_json::Result<String> {
    serde_json::to_string(self)
  }
}
