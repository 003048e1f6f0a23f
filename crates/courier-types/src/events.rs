use serde::{Deserialize, Serialize};

use crate::models::{Message, RoomId};

/// Events sent server -> client over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// A message landed in a room.
    NewMessage { room_id: RoomId, message: Message },

    /// A room and all its messages were deleted.
    RoomDeleted { room_id: RoomId },

    /// A user acknowledged a message.
    Read { message_id: i64, user_id: String },
}

/// Commands sent client -> server over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Start receiving events for a room. Joining twice is a no-op.
    JoinRoom { room_id: RoomId },

    /// Stop receiving events for a room.
    LeaveRoom { room_id: RoomId },

    /// Queue a command for a polling device (web UI -> phone).
    EnqueueCmd {
        device_id: String,
        command: CommandRequest,
    },
}

/// An incoming command body, before the server assigns id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_frames_use_snake_case_tags() {
        let event = GatewayEvent::RoomDeleted { room_id: RoomId(4) };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "room_deleted");
        assert_eq!(json["data"]["room_id"], 4);
    }

    #[test]
    fn join_room_accepts_string_room_id() {
        let cmd: GatewayCommand =
            serde_json::from_str(r#"{"type":"join_room","data":{"room_id":"12"}}"#).unwrap();
        match cmd {
            GatewayCommand::JoinRoom { room_id } => assert_eq!(room_id, RoomId(12)),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
