use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    pub id: i64,
    pub name: String,
    pub room: String,
    /// Surrogate id of the linked device, if any.
    pub device_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Resident joined with its linked device.
#[derive(Debug, Clone, FromRow)]
pub struct ResidentRow {
    #[sqlx(flatten)]
    pub resident: Resident,
    pub device_external_id: Option<String>,
    pub device_name: Option<String>,
    pub device_room: Option<String>,
    pub device_is_active: Option<bool>,
    pub device_last_seen_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedDevice {
    pub id: i64,
    pub device_id: String,
    pub name: Option<String>,
    pub room: Option<String>,
    pub is_active: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentWithDevice {
    #[serde(flatten)]
    pub resident: Resident,
    pub device: Option<LinkedDevice>,
}

impl From<ResidentRow> for ResidentWithDevice {
    fn from(row: ResidentRow) -> Self {
        let device = match (row.resident.device_id, row.device_external_id) {
            (Some(id), Some(device_id)) => Some(LinkedDevice {
                id,
                device_id,
                name: row.device_name,
                room: row.device_room,
                is_active: row.device_is_active.unwrap_or(false),
                last_seen_at: row.device_last_seen_at,
            }),
            _ => None,
        };
        Self {
            resident: row.resident,
            device,
        }
    }
}
