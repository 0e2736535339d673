use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::JsonBody;
use crate::context::AppContext;
use crate::error::ApiResult;
use crate::service::notifications;

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    token: Option<String>,
    platform: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendBody {
    token: Option<String>,
    title: Option<String>,
    body: Option<String>,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/push/register", post(register))
        .route("/api/push/send-test", post(send_test))
        .route("/api/push/send-one", post(send_one))
}

async fn register(
    State(ctx): State<AppContext>,
    JsonBody(body): JsonBody<RegisterBody>,
) -> ApiResult<Json<Value>> {
    let saved = notifications::register(&ctx.pool, body.token, body.platform).await?;
    Ok(Json(json!({ "ok": true, "pushToken": saved })))
}

async fn send_test(
    State(ctx): State<AppContext>,
    JsonBody(body): JsonBody<SendBody>,
) -> ApiResult<Json<Value>> {
    let report = notifications::send_test(&ctx, body.title, body.body).await?;
    Ok(Json(json!({
        "ok": true,
        "attempted": report.attempted,
        "sent": report.sent,
        "failed": report.failed,
        "failures": report.failures,
    })))
}

async fn send_one(
    State(ctx): State<AppContext>,
    JsonBody(body): JsonBody<SendBody>,
) -> ApiResult<Json<Value>> {
    let message_id = notifications::send_one(&ctx, body.token, body.title, body.body).await?;
    Ok(Json(json!({ "ok": true, "messageId": message_id })))
}
