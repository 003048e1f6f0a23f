use serde::{Deserialize, Serialize};

use crate::models::{Command, Message, Room, RoomId};

// -- JWT Claims --

/// JWT claims shared between courier-api (REST middleware) and the login
/// endpoint. The subject is the nickname the token was issued for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub nickname: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub token: String,
    pub user: String,
}

// -- Rooms --

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub ok: bool,
    pub room: Room,
}

#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub ok: bool,
    pub rooms: Vec<Room>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    /// Incremental sync: return only messages with ts strictly greater.
    pub since: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub ok: bool,
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub ok: bool,
    pub messages: Vec<Message>,
}

// -- Devices --

#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub ok: bool,
    pub cmds: Vec<Command>,
}

/// A device-originated report. `received` carries an inbound chat message
/// the phone relayed; any other type is acknowledged and dropped.
#[derive(Debug, Deserialize)]
pub struct DeviceReport {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Option<ReportPayload>,
}

#[derive(Debug, Deserialize)]
pub struct ReportPayload {
    pub room_id: RoomId,
    pub user: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
}

// -- Generic --

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}
