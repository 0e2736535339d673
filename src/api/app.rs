//! The household admin's mobile app: bearer token plus a usable plan.

use axum::extract::State;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::alerts::StatusBody;
use super::extract::{AppUser, Id, JsonBody};
use crate::context::AppContext;
use crate::error::ApiResult;
use crate::models::alert::{AlertResponse, AlertView};
use crate::service::{alerts, devices};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimBody {
    device_id: Option<String>,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/app/devices", get(my_devices))
        .route("/api/app/devices/claim", post(claim))
        .route("/api/app/alerts", get(my_alerts))
        .route("/api/app/alerts/latest", get(my_latest))
        .route("/api/app/alerts/:id", patch(transition))
}

fn alerts_json(views: Vec<AlertView>) -> Json<Value> {
    let alerts: Vec<AlertResponse> = views.into_iter().map(AlertResponse::from).collect();
    Json(json!({ "ok": true, "alerts": alerts }))
}

async fn my_devices(State(ctx): State<AppContext>, app: AppUser) -> ApiResult<Json<Value>> {
    let owned = devices::owned_by(&ctx.pool, app.user.id).await?;
    Ok(Json(json!({
        "ok": true,
        "plan": app.subscription.plan,
        "deviceLimit": app.subscription.device_limit(),
        "count": owned.len(),
        "devices": owned,
    })))
}

async fn claim(
    State(ctx): State<AppContext>,
    app: AppUser,
    JsonBody(body): JsonBody<ClaimBody>,
) -> ApiResult<Json<Value>> {
    let device = devices::claim(&ctx.pool, app.user.id, &app.subscription, body.device_id).await?;
    Ok(Json(json!({ "ok": true, "device": device })))
}

async fn my_alerts(State(ctx): State<AppContext>, app: AppUser) -> ApiResult<Json<Value>> {
    let views = alerts::list_owned(&ctx.pool, app.user.id, alerts::LIST_LIMIT).await?;
    Ok(alerts_json(views))
}

async fn my_latest(State(ctx): State<AppContext>, app: AppUser) -> ApiResult<Json<Value>> {
    let views = alerts::latest_owned(&ctx.pool, app.user.id).await?;
    Ok(alerts_json(views))
}

/// Answers with the alert's fields at top level and again under `alert`,
/// which is what shipped app builds read.
async fn transition(
    State(ctx): State<AppContext>,
    app: AppUser,
    Id(id): Id,
    JsonBody(body): JsonBody<StatusBody>,
) -> ApiResult<Json<Value>> {
    let view = alerts::transition(&ctx.pool, id, body.status.as_deref(), Some(app.user.id)).await?;
    let payload = serde_json::to_value(AlertResponse::from(view)).map_err(anyhow::Error::from)?;

    let mut response = json!({ "ok": true });
    if let (Some(out), Value::Object(fields)) = (response.as_object_mut(), &payload) {
        out.extend(fields.clone());
    }
    response["alert"] = payload;
    Ok(Json(response))
}
