use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use super::extract::ApiKey;
use crate::context::AppContext;
use crate::error::{ApiError, ApiResult};

const FILE_FIELD: &str = "file";

pub fn routes(max_bytes: usize) -> Router<AppContext> {
    Router::new().route(
        "/api/upload",
        post(upload).layer(DefaultBodyLimit::max(max_bytes)),
    )
}

/// Takes the multipart field `file` and hands it to the media store.
async fn upload(
    State(ctx): State<AppContext>,
    _: ApiKey,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Value>> {
    let mut multipart = multipart.map_err(|e| ApiError::validation(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.bin").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        if bytes.is_empty() {
            return Err(ApiError::validation("No file uploaded"));
        }

        let size = bytes.len();
        let media = ctx.media.upload(&file_name, bytes.to_vec()).await?;
        info!("Uploaded {} ({} bytes) as {}", file_name, size, media.id);
        return Ok(Json(json!({ "ok": true, "mediaUrl": media.url, "mediaId": media.id })));
    }

    Err(ApiError::validation("No file uploaded"))
}
