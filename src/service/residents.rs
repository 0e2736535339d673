use tracing::info;

use super::non_empty;
use crate::clock;
use crate::db::{self, queries, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::models::device::Device;
use crate::models::resident::{Resident, ResidentRow, ResidentWithDevice};

pub async fn list(pool: &DbPool) -> ApiResult<Vec<ResidentWithDevice>> {
    let rows = sqlx::query_as::<_, ResidentRow>(queries::SELECT_RESIDENTS_WITH_DEVICE)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(ResidentWithDevice::from).collect())
}

pub async fn get(pool: &DbPool, id: i64) -> ApiResult<Option<Resident>> {
    let resident = sqlx::query_as::<_, Resident>(queries::SELECT_RESIDENT_BY_ID)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(resident)
}

pub async fn find_by_name(pool: &DbPool, name: &str) -> ApiResult<Option<Resident>> {
    let resident = sqlx::query_as::<_, Resident>(queries::SELECT_RESIDENT_BY_NAME)
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(resident)
}

pub async fn create(
    pool: &DbPool,
    name: Option<String>,
    room: Option<String>,
) -> ApiResult<Resident> {
    let (name, room) = match (non_empty(name), non_empty(room)) {
        (Some(n), Some(r)) => (n, r),
        _ => return Err(ApiError::validation("name and room are required")),
    };

    let resident = sqlx::query_as::<_, Resident>(queries::INSERT_RESIDENT)
        .bind(&name)
        .bind(&room)
        .bind(clock::now())
        .fetch_one(pool)
        .await
        .map_err(duplicate_name)?;

    info!("Created resident {} ({})", resident.name, resident.id);
    Ok(resident)
}

pub async fn update(
    pool: &DbPool,
    id: i64,
    name: Option<String>,
    room: Option<String>,
) -> ApiResult<Resident> {
    if name.is_none() && room.is_none() {
        return Err(ApiError::validation("Provide name or room"));
    }
    let name = match name {
        Some(n) => Some(
            non_empty(Some(n)).ok_or_else(|| ApiError::validation("name must not be empty"))?,
        ),
        None => None,
    };
    let room = match room {
        Some(r) => Some(
            non_empty(Some(r)).ok_or_else(|| ApiError::validation("room must not be empty"))?,
        ),
        None => None,
    };

    sqlx::query_as::<_, Resident>(queries::UPDATE_RESIDENT)
        .bind(id)
        .bind(name)
        .bind(room)
        .fetch_optional(pool)
        .await
        .map_err(duplicate_name)?
        .ok_or_else(|| ApiError::not_found("Resident not found"))
}

/// Links a device (by surrogate id). A device serves at most one resident.
pub async fn assign_device(pool: &DbPool, id: i64, device_pk: Option<i64>) -> ApiResult<Resident> {
    let device_pk = device_pk
        .filter(|d| *d > 0)
        .ok_or_else(|| ApiError::validation("deviceId (number) is required"))?;

    get(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Resident not found"))?;

    let device = sqlx::query_as::<_, Device>(queries::SELECT_DEVICE_BY_ID)
        .bind(device_pk)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Device not found"))?;
    if !device.is_active {
        return Err(ApiError::conflict("Device is disabled (inactive)"));
    }

    let holder = sqlx::query_as::<_, Resident>(queries::SELECT_RESIDENT_BY_DEVICE)
        .bind(device_pk)
        .fetch_optional(pool)
        .await?;
    if let Some(holder) = holder.filter(|h| h.id != id) {
        return Err(already_assigned(holder.id));
    }

    let updated = sqlx::query_as::<_, Resident>(queries::SET_RESIDENT_DEVICE)
        .bind(id)
        .bind(device_pk)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            // Lost a race with another assignment; the unique index caught it.
            if db::is_unique_violation(&e) {
                ApiError::conflict("Device already assigned to another resident")
            } else {
                e.into()
            }
        })?
        .ok_or_else(|| ApiError::not_found("Resident not found"))?;

    info!("Resident {} linked to device {}", updated.id, device.device_id);
    Ok(updated)
}

pub async fn unassign_device(pool: &DbPool, id: i64) -> ApiResult<Resident> {
    sqlx::query_as::<_, Resident>(queries::SET_RESIDENT_DEVICE)
        .bind(id)
        .bind(None::<i64>)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Resident not found"))
}

/// Refused while the resident has New or Acknowledged alerts. Older alerts
/// survive with their snapshot fields and a cleared link.
pub async fn delete(pool: &DbPool, id: i64) -> ApiResult<()> {
    let deleted = sqlx::query(queries::DELETE_RESIDENT_IF_IDLE)
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    if deleted > 0 {
        info!("Deleted resident {}", id);
        return Ok(());
    }

    if get(pool, id).await?.is_none() {
        return Err(ApiError::not_found("Resident not found"));
    }
    let active: i64 = sqlx::query_scalar(queries::COUNT_ACTIVE_ALERTS_FOR_RESIDENT)
        .bind(id)
        .fetch_one(pool)
        .await?;
    Err(ApiError::conflict("Cannot delete resident with active alerts")
        .with_detail("activeAlerts", active))
}

fn duplicate_name(e: sqlx::Error) -> ApiError {
    if db::is_unique_violation(&e) {
        ApiError::conflict("Resident name already exists")
    } else {
        e.into()
    }
}

fn already_assigned(resident_id: i64) -> ApiError {
    ApiError::conflict("Device already assigned to another resident")
        .with_detail("assignedResidentId", resident_id)
}
