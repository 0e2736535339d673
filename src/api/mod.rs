//! HTTP surface.
//!
//! - `/api/auth/*`, `/api/subscription/*`: bearer-token account flows
//! - `/api/app/*`: the household admin's app, owner-scoped
//! - `/api/residents`, `/api/devices`, `/api/alerts`, `/api/events`,
//!   `/api/upload`, `/api/admin/*`, `/api/household-admins`: API key
//! - `/api/heartbeat`, `/api/push/*`, `/api/health`: open

pub mod extract;

mod admin;
mod alerts;
mod app;
mod auth;
mod devices;
mod push;
mod residents;
mod subscription;
mod upload;

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::context::AppContext;

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .merge(auth::routes())
        .merge(subscription::routes())
        .merge(app::routes())
        .merge(residents::routes())
        .merge(devices::routes())
        .merge(alerts::routes())
        .merge(upload::routes(ctx.config.upload_max_bytes))
        .merge(push::routes())
        .merge(admin::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Serves until `shutdown` resolves, then drains in-flight requests.
pub async fn serve(
    ctx: AppContext,
    bind: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .context(format!("Failed to bind to {}", bind))?;

    info!("API listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}
