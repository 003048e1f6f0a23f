use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
};

use courier_db::StoreError;
use courier_types::api::{Claims, MessageResponse, MessagesQuery, MessagesResponse, OkResponse};
use courier_types::events::GatewayEvent;
use courier_types::models::RoomId;

use crate::error::join_error;
use crate::{ApiResult, AppState, ingest};

pub async fn get_messages(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<MessagesResponse>> {
    let db = state.db.clone();
    let messages =
        tokio::task::spawn_blocking(move || db.list_messages(RoomId(room_id), query.since))
            .await
            .map_err(join_error)??;

    Ok(Json(MessagesResponse { ok: true, messages }))
}

/// Live web submission: multipart `text` plus optional `image` file. The
/// image is stored first and its reference travels with the message; the
/// append + fanout goes through the same ingestion path device reports use.
pub async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> ApiResult<Json<MessageResponse>> {
    let mut text: Option<String> = None;
    let mut image: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| StoreError::InvalidInput(format!("bad multipart body: {e}")))?
    {
        match field.name() {
            Some("text") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| StoreError::InvalidInput(format!("bad text field: {e}")))?;
                text = Some(value);
            }
            Some("image") => {
                let original_name = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| StoreError::InvalidInput(format!("bad image field: {e}")))?;
                if !data.is_empty() {
                    image = Some(state.uploads.store(original_name.as_deref(), &data).await?);
                }
            }
            _ => {}
        }
    }

    let message = ingest::submit(&state, RoomId(room_id), claims.sub, text, image).await?;
    Ok(Json(MessageResponse { ok: true, message }))
}

/// Read-receipt acknowledgement: records the reader idempotently, then
/// notifies the message's room so live clients can update their indicators.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<OkResponse>> {
    let db = state.db.clone();
    let user = claims.sub.clone();
    let room_id = tokio::task::spawn_blocking(move || db.mark_read(message_id, &user))
        .await
        .map_err(join_error)??;

    state
        .dispatcher
        .publish(
            room_id,
            GatewayEvent::Read {
                message_id,
                user_id: claims.sub,
            },
        )
        .await;

    Ok(Json(OkResponse::ok()))
}
