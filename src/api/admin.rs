use axum::extract::State;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{ApiKey, Id, JsonBody};
use crate::context::AppContext;
use crate::error::{ApiError, ApiResult};
use crate::service::{accounts, admin};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    is_disabled: Option<Value>,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/admin/stats", get(stats))
        .route("/api/household-admins", get(household_admins))
        .route("/api/household-admins/:id/status", patch(set_status))
}

/// Always 200; figures that failed are listed in `partialFailures`.
async fn stats(State(ctx): State<AppContext>, _: ApiKey) -> ApiResult<Json<Value>> {
    let stats = admin::dashboard(&ctx).await;
    let mut body = serde_json::to_value(&stats).map_err(anyhow::Error::from)?;
    body["ok"] = Value::Bool(true);
    Ok(Json(body))
}

async fn household_admins(State(ctx): State<AppContext>, _: ApiKey) -> ApiResult<Json<Value>> {
    let users = accounts::list_users(&ctx.pool).await?;
    Ok(Json(json!({ "ok": true, "users": users })))
}

async fn set_status(
    State(ctx): State<AppContext>,
    _: ApiKey,
    Id(id): Id,
    JsonBody(body): JsonBody<StatusBody>,
) -> ApiResult<Json<Value>> {
    let disabled = match body.is_disabled {
        Some(Value::Bool(b)) => b,
        _ => return Err(ApiError::validation("isDisabled must be boolean")),
    };
    let user = accounts::set_disabled(&ctx.pool, id, disabled).await?;
    Ok(Json(json!({ "ok": true, "user": user })))
}
