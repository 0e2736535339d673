use axum::extract::{Query, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use super::extract::{ApiKey, Id, JsonBody};
use crate::context::AppContext;
use crate::error::ApiResult;
use crate::models::device::Device;
use crate::models::payload::HeartbeatPayload;
use crate::service::devices::{self, DevicePatch};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    include_inactive: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchBody {
    #[serde(default, deserialize_with = "present")]
    name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    room: Option<Option<String>>,
    is_active: Option<bool>,
}

/// Tells an explicit `null` (clear the field) from an absent key.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/devices", get(list).post(register))
        .route("/api/devices/:id", patch(update).delete(disable))
        .route("/api/devices/heartbeat", post(heartbeat))
        .route("/api/heartbeat", post(heartbeat))
}

async fn list(
    State(ctx): State<AppContext>,
    _: ApiKey,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Device>>> {
    let include_inactive = query.include_inactive.as_deref() == Some("true");
    Ok(Json(devices::list(&ctx.pool, include_inactive).await?))
}

async fn register(
    State(ctx): State<AppContext>,
    _: ApiKey,
    JsonBody(body): JsonBody<HeartbeatPayload>,
) -> ApiResult<Json<Value>> {
    let created = devices::register(&ctx.pool, body.device_id, body.name, body.room).await?;
    Ok(Json(json!({ "ok": true, "created": created })))
}

async fn update(
    State(ctx): State<AppContext>,
    _: ApiKey,
    Id(id): Id,
    JsonBody(body): JsonBody<PatchBody>,
) -> ApiResult<Json<Value>> {
    let patch = DevicePatch {
        name: body.name,
        room: body.room,
        is_active: body.is_active,
    };
    let updated = devices::update(&ctx.pool, id, patch).await?;
    Ok(Json(json!({ "ok": true, "updated": updated })))
}

async fn disable(State(ctx): State<AppContext>, _: ApiKey, Id(id): Id) -> ApiResult<Json<Value>> {
    let disabled = devices::disable(&ctx.pool, id).await?;
    Ok(Json(json!({ "ok": true, "disabled": disabled })))
}

/// Unauthenticated: units only know their own id.
async fn heartbeat(
    State(ctx): State<AppContext>,
    JsonBody(body): JsonBody<HeartbeatPayload>,
) -> ApiResult<Json<Value>> {
    let device = devices::heartbeat(&ctx.pool, body.device_id, body.name, body.room).await?;
    Ok(Json(json!({
        "ok": true,
        "deviceId": device.device_id,
        "status": "Online",
        "lastSeen": device.last_seen_at,
    })))
}
