use axum::extract::State;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{ApiKey, Id, JsonBody};
use crate::context::AppContext;
use crate::error::ApiResult;
use crate::models::resident::ResidentWithDevice;
use crate::service::residents;

#[derive(Debug, Deserialize)]
pub struct ResidentBody {
    name: Option<String>,
    room: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDevice {
    device_id: Option<i64>,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/residents", get(list).post(create))
        .route("/api/residents/:id", patch(update).delete(remove))
        .route("/api/residents/:id/assign-device", patch(assign_device))
        .route("/api/residents/:id/unassign-device", patch(unassign_device))
}

async fn list(
    State(ctx): State<AppContext>,
    _: ApiKey,
) -> ApiResult<Json<Vec<ResidentWithDevice>>> {
    Ok(Json(residents::list(&ctx.pool).await?))
}

async fn create(
    State(ctx): State<AppContext>,
    _: ApiKey,
    JsonBody(body): JsonBody<ResidentBody>,
) -> ApiResult<Json<Value>> {
    let created = residents::create(&ctx.pool, body.name, body.room).await?;
    Ok(Json(json!({ "ok": true, "created": created })))
}

async fn update(
    State(ctx): State<AppContext>,
    _: ApiKey,
    Id(id): Id,
    JsonBody(body): JsonBody<ResidentBody>,
) -> ApiResult<Json<Value>> {
    let updated = residents::update(&ctx.pool, id, body.name, body.room).await?;
    Ok(Json(json!({ "ok": true, "updated": updated })))
}

async fn assign_device(
    State(ctx): State<AppContext>,
    _: ApiKey,
    Id(id): Id,
    JsonBody(body): JsonBody<AssignDevice>,
) -> ApiResult<Json<Value>> {
    let updated = residents::assign_device(&ctx.pool, id, body.device_id).await?;
    Ok(Json(json!({ "ok": true, "updated": updated })))
}

async fn unassign_device(
    State(ctx): State<AppContext>,
    _: ApiKey,
    Id(id): Id,
) -> ApiResult<Json<Value>> {
    let updated = residents::unassign_device(&ctx.pool, id).await?;
    Ok(Json(json!({ "ok": true, "updated": updated })))
}

async fn remove(State(ctx): State<AppContext>, _: ApiKey, Id(id): Id) -> ApiResult<Json<Value>> {
    residents::delete(&ctx.pool, id).await?;
    Ok(Json(json!({ "ok": true })))
}
