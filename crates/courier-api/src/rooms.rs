use axum::{
    Json,
    extract::{Path, State},
};

use courier_types::api::{CreateRoomRequest, OkResponse, RoomResponse, RoomsResponse};
use courier_types::events::GatewayEvent;
use courier_types::models::RoomId;

use crate::error::join_error;
use crate::{ApiResult, AppState};

/// Create-by-name is idempotent: posting an existing name returns the
/// existing room instead of a conflict.
pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> ApiResult<Json<RoomResponse>> {
    let db = state.db.clone();
    let name = req.name.trim().to_string();
    let room = tokio::task::spawn_blocking(move || db.create_room(&name))
        .await
        .map_err(join_error)??;

    Ok(Json(RoomResponse { ok: true, room }))
}

pub async fn list_rooms(State(state): State<AppState>) -> ApiResult<Json<RoomsResponse>> {
    let db = state.db.clone();
    let rooms = tokio::task::spawn_blocking(move || db.list_rooms())
        .await
        .map_err(join_error)??;

    Ok(Json(RoomsResponse { ok: true, rooms }))
}

/// Delete a room and everything in it, then tell the room's subscribers it
/// is gone and discard their subscriptions.
pub async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
) -> ApiResult<Json<OkResponse>> {
    let room_id = RoomId(room_id);

    let db = state.db.clone();
    tokio::task::spawn_blocking(move || db.delete_room(room_id))
        .await
        .map_err(join_error)??;

    state
        .dispatcher
        .publish(room_id, GatewayEvent::RoomDeleted { room_id })
        .await;
    state.dispatcher.drop_room(room_id).await;

    Ok(Json(OkResponse::ok()))
}
