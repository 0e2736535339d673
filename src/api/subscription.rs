use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{AuthUser, JsonBody};
use crate::context::AppContext;
use crate::error::ApiResult;
use crate::models::subscription::Subscription;
use crate::service::subscriptions;

#[derive(Debug, Deserialize)]
pub struct SelectPlan {
    plan: Option<String>,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/subscription/me", get(me))
        .route("/api/subscription/select", post(select))
        .route("/api/subscription/confirm-payment", post(confirm_payment))
}

fn subscription_json(sub: Subscription) -> Json<Value> {
    let limit = sub.device_limit();
    Json(json!({ "ok": true, "subscription": sub, "deviceLimit": limit }))
}

async fn me(State(ctx): State<AppContext>, AuthUser(user): AuthUser) -> ApiResult<Json<Value>> {
    match subscriptions::current(&ctx.pool, user.id).await? {
        Some(sub) => Ok(subscription_json(sub)),
        None => Ok(Json(json!({ "ok": true, "subscription": null }))),
    }
}

async fn select(
    State(ctx): State<AppContext>,
    AuthUser(user): AuthUser,
    JsonBody(body): JsonBody<SelectPlan>,
) -> ApiResult<Json<Value>> {
    let plan = body.plan.map(|p| p.trim().to_uppercase());
    let sub = subscriptions::select(&ctx.pool, user.id, plan.as_deref()).await?;
    Ok(subscription_json(sub))
}

async fn confirm_payment(
    State(ctx): State<AppContext>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let sub = subscriptions::confirm_payment(&ctx.pool, user.id).await?;
    Ok(subscription_json(sub))
}
