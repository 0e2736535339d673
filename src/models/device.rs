use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    /// Stable identifier the hardware reports, e.g. "CAM-201".
    pub device_id: String,
    pub name: Option<String>,
    pub room: Option<String>,
    pub user_id: Option<i64>,
    pub is_active: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Device {
    /// Offline when it has checked in before and the last check-in is older
    /// than `threshold` at `now`. Devices that never checked in are not judged.
    pub fn is_offline(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        match self.last_seen_at {
            Some(last) => now - last > threshold,
            None => false,
        }
    }
}
