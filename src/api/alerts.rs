use axum::extract::State;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{ApiKey, Id, JsonBody};
use crate::context::AppContext;
use crate::error::ApiResult;
use crate::models::alert::AlertResponse;
use crate::models::payload::EventPayload;
use crate::service::alerts;

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaBody {
    media_url: Option<String>,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/alerts", get(list).post(create))
        .route("/api/alerts/latest", get(latest))
        .route("/api/alerts/:id", get(detail).patch(transition))
        .route("/api/alerts/:id/media", patch(set_media))
        .route("/api/events", post(create))
}

async fn list(State(ctx): State<AppContext>, _: ApiKey) -> ApiResult<Json<Vec<AlertResponse>>> {
    let views = alerts::list(&ctx.pool, alerts::LIST_LIMIT).await?;
    Ok(Json(views.into_iter().map(AlertResponse::from).collect()))
}

async fn latest(State(ctx): State<AppContext>, _: ApiKey) -> ApiResult<Json<Vec<AlertResponse>>> {
    let views = alerts::latest(&ctx.pool).await?;
    Ok(Json(views.into_iter().map(AlertResponse::from).collect()))
}

async fn detail(
    State(ctx): State<AppContext>,
    _: ApiKey,
    Id(id): Id,
) -> ApiResult<Json<AlertResponse>> {
    let view = alerts::get(&ctx.pool, id).await?;
    Ok(Json(AlertResponse::detail(view)))
}

/// Sensor events and hand-entered alerts share one path in.
async fn create(
    State(ctx): State<AppContext>,
    _: ApiKey,
    JsonBody(event): JsonBody<EventPayload>,
) -> ApiResult<Json<Value>> {
    let view = alerts::create(&ctx, event).await?;
    Ok(Json(json!({ "ok": true, "created": AlertResponse::from(view) })))
}

async fn transition(
    State(ctx): State<AppContext>,
    _: ApiKey,
    Id(id): Id,
    JsonBody(body): JsonBody<StatusBody>,
) -> ApiResult<Json<AlertResponse>> {
    let view = alerts::transition(&ctx.pool, id, body.status.as_deref(), None).await?;
    Ok(Json(AlertResponse::from(view)))
}

async fn set_media(
    State(ctx): State<AppContext>,
    _: ApiKey,
    Id(id): Id,
    JsonBody(body): JsonBody<MediaBody>,
) -> ApiResult<Json<Value>> {
    let view = alerts::set_media(&ctx.pool, id, body.media_url).await?;
    Ok(Json(json!({ "ok": true, "updated": AlertResponse::from(view) })))
}
