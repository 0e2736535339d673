use tracing::{info, warn};

use super::non_empty;
use crate::clock;
use crate::db::{self, queries, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::models::device::Device;
use crate::models::subscription::Subscription;

/// Check-in from a unit. Unknown units are registered on the spot; units an
/// admin disabled stay rejected and their `last_seen_at` is left alone.
pub async fn heartbeat(
    pool: &DbPool,
    device_id: Option<String>,
    name: Option<String>,
    room: Option<String>,
) -> ApiResult<Device> {
    let device_id =
        non_empty(device_id).ok_or_else(|| ApiError::validation("deviceId is required"))?;

    let device = sqlx::query_as::<_, Device>(queries::HEARTBEAT_UPSERT)
        .bind(&device_id)
        .bind(non_empty(name))
        .bind(non_empty(room))
        .bind(clock::now())
        .fetch_optional(pool)
        .await?;

    match device {
        Some(d) => Ok(d),
        None => {
            warn!("Heartbeat from disabled device {}", device_id);
            Err(ApiError::forbidden("Device is disabled by admin"))
        }
    }
}

pub async fn register(
    pool: &DbPool,
    device_id: Option<String>,
    name: Option<String>,
    room: Option<String>,
) -> ApiResult<Device> {
    let device_id =
        non_empty(device_id).ok_or_else(|| ApiError::validation("deviceId is required"))?;

    let device = sqlx::query_as::<_, Device>(queries::INSERT_DEVICE)
        .bind(&device_id)
        .bind(non_empty(name))
        .bind(non_empty(room))
        .bind(clock::now())
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                ApiError::conflict("deviceId already exists")
            } else {
                e.into()
            }
        })?;

    info!("Registered device {} ({})", device.device_id, device.id);
    Ok(device)
}

pub async fn list(pool: &DbPool, include_inactive: bool) -> ApiResult<Vec<Device>> {
    let sql = if include_inactive {
        queries::SELECT_ALL_DEVICES
    } else {
        queries::SELECT_ACTIVE_DEVICES
    };
    Ok(sqlx::query_as::<_, Device>(sql).fetch_all(pool).await?)
}

pub async fn owned_by(pool: &DbPool, user_id: i64) -> ApiResult<Vec<Device>> {
    let devices = sqlx::query_as::<_, Device>(queries::SELECT_DEVICES_BY_USER)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(devices)
}

/// Admin edit. The outer `Option` says whether the field was sent; an inner
/// `None` (or blank string) clears it.
#[derive(Debug, Default)]
pub struct DevicePatch {
    pub name: Option<Option<String>>,
    pub room: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl DevicePatch {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.room.is_none() && self.is_active.is_none()
    }
}

pub async fn update(pool: &DbPool, id: i64, patch: DevicePatch) -> ApiResult<Device> {
    if patch.is_empty() {
        return Err(ApiError::validation("Provide name, room, or isActive"));
    }

    let device = sqlx::query_as::<_, Device>(queries::UPDATE_DEVICE)
        .bind(id)
        .bind(patch.name.is_some())
        .bind(patch.name.flatten().and_then(|n| non_empty(Some(n))))
        .bind(patch.room.is_some())
        .bind(patch.room.flatten().and_then(|r| non_empty(Some(r))))
        .bind(patch.is_active)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Device not found"))?;
    Ok(device)
}

/// Soft delete. Residents and alerts keep their links.
pub async fn disable(pool: &DbPool, id: i64) -> ApiResult<Device> {
    let device = sqlx::query_as::<_, Device>(queries::DISABLE_DEVICE)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Device not found"))?;
    info!("Disabled device {} ({})", device.device_id, device.id);
    Ok(device)
}

/// Attaches an existing device to the user. The quota check and the owner
/// write happen in one statement, so parallel claims cannot exceed the plan.
pub async fn claim(
    pool: &DbPool,
    user_id: i64,
    subscription: &Subscription,
    device_id: Option<String>,
) -> ApiResult<Device> {
    let device_id =
        non_empty(device_id).ok_or_else(|| ApiError::validation("deviceId is required"))?;
    let limit = subscription.device_limit();

    let claimed = sqlx::query_as::<_, Device>(queries::CLAIM_DEVICE)
        .bind(&device_id)
        .bind(user_id)
        .bind(limit)
        .fetch_optional(pool)
        .await?;

    if let Some(device) = claimed {
        info!("User {} claimed device {}", user_id, device.device_id);
        return Ok(device);
    }

    // Nothing matched: work out why, in the order clients expect.
    let device = sqlx::query_as::<_, Device>(queries::SELECT_DEVICE_BY_EXTERNAL_ID)
        .bind(&device_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Device not found"))?;

    let owned: i64 = sqlx::query_scalar(queries::COUNT_DEVICES_BY_USER)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    if owned >= limit {
        return Err(ApiError::conflict("Device limit reached")
            .with_detail("plan", subscription.plan.as_str())
            .with_detail("limit", limit));
    }
    if !device.is_active {
        return Err(ApiError::conflict("Device is disabled"));
    }
    if device.user_id.is_some_and(|owner| owner != user_id) {
        return Err(ApiError::conflict("Device already claimed"));
    }

    // The row changed between the two statements; report it as a conflict
    // rather than guessing.
    Err(ApiError::conflict("Device changed during claim, retry"))
}
