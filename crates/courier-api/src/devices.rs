use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::debug;

use courier_db::StoreError;
use courier_types::api::{
    DeviceReport, OkResponse, PollQuery, PollResponse, RegisterDeviceRequest,
};
use courier_types::events::CommandRequest;

use crate::error::join_error;
use crate::{ApiResult, AppState, ingest};

/// Device registration is an upsert: a phone can re-register on every boot
/// without losing commands queued while it was offline.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterDeviceRequest>,
) -> ApiResult<Json<OkResponse>> {
    let db = state.db.clone();
    let name = req.name.unwrap_or_else(|| "phone".to_string());
    tokio::task::spawn_blocking(move || db.register_device(&req.id, &name))
        .await
        .map_err(join_error)??;

    Ok(Json(OkResponse::ok()))
}

/// One poll cycle: atomically hand over and clear the device's queue.
/// A lost response loses the handed-over commands; delivery is at-most-once
/// by design.
pub async fn poll(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> ApiResult<Json<PollResponse>> {
    if query.id.is_empty() {
        return Err(StoreError::InvalidInput("id required".into()).into());
    }

    let db = state.db.clone();
    let cmds = tokio::task::spawn_blocking(move || db.drain_commands(&query.id))
        .await
        .map_err(join_error)??;

    Ok(Json(PollResponse { ok: true, cmds }))
}

pub async fn enqueue(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(req): Json<CommandRequest>,
) -> ApiResult<Json<OkResponse>> {
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || db.enqueue_command(&device_id, &req))
        .await
        .map_err(join_error)??;

    Ok(Json(OkResponse::ok()))
}

/// Inbound report from a phone. A `received` report is an asynchronous
/// message submission and goes through the same ingestion path as the web;
/// every other report type is acknowledged and dropped.
pub async fn report(
    State(state): State<AppState>,
    Json(report): Json<DeviceReport>,
) -> ApiResult<Json<OkResponse>> {
    if report.kind != "received" {
        debug!("ignoring device report of type '{}'", report.kind);
        return Ok(Json(OkResponse::ok()));
    }

    let payload = report
        .payload
        .ok_or_else(|| StoreError::InvalidInput("received report needs a payload".into()))?;

    ingest::submit(
        &state,
        payload.room_id,
        ingest::device_author(payload.user),
        payload.text,
        payload.image,
    )
    .await?;

    Ok(Json(OkResponse::ok()))
}
