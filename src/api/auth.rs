use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::JsonBody;
use crate::context::AppContext;
use crate::error::ApiResult;
use crate::service::accounts::{self, Session};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    email: Option<String>,
    password: Option<String>,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
}

fn session_json(session: Session) -> Json<Value> {
    Json(json!({ "ok": true, "token": session.token, "user": session.user }))
}

async fn signup(
    State(ctx): State<AppContext>,
    JsonBody(body): JsonBody<Credentials>,
) -> ApiResult<Json<Value>> {
    let session = accounts::signup(&ctx, body.email, body.password).await?;
    Ok(session_json(session))
}

async fn login(
    State(ctx): State<AppContext>,
    JsonBody(body): JsonBody<Credentials>,
) -> ApiResult<Json<Value>> {
    let session = accounts::login(&ctx, body.email, body.password).await?;
    Ok(session_json(session))
}
