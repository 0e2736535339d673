use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Alert type the offline sweep writes.
pub const DEVICE_OFFLINE: &str = "Device offline";
/// `elderly` snapshot on alerts the system raises itself.
pub const SYSTEM_ELDERLY: &str = "System";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertStatus {
    New,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::New => "New",
            AlertStatus::Acknowledged => "Acknowledged",
            AlertStatus::Resolved => "Resolved",
        }
    }

    /// Position in the lifecycle; a transition may never lower it.
    pub fn rank(self) -> i64 {
        match self {
            AlertStatus::New => 0,
            AlertStatus::Acknowledged => 1,
            AlertStatus::Resolved => 2,
        }
    }

    /// Parses what clients send: case-insensitive, with the app's synonyms.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "new" => Some(AlertStatus::New),
            "acknowledged" | "acknowledge" | "checked" => Some(AlertStatus::Acknowledged),
            "resolved" => Some(AlertStatus::Resolved),
            _ => None,
        }
    }
}

impl TryFrom<String> for AlertStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "New" => Ok(AlertStatus::New),
            "Acknowledged" => Ok(AlertStatus::Acknowledged),
            "Resolved" => Ok(AlertStatus::Resolved),
            other => Err(format!("unknown alert status '{}'", other)),
        }
    }
}

/// Converts a reported confidence to a whole percentage.
///
/// Sensors report either a fraction (`0.97`) or a percentage (`97`). Values up
/// to and including 1 are read as fractions, so `1.0` means 100%.
pub fn confidence_percent(raw: f64) -> Result<i64, String> {
    if !raw.is_finite() || raw < 0.0 {
        return Err("confidence must be a non-negative number".to_string());
    }
    let percent = if raw <= 1.0 { raw * 100.0 } else { raw }.round();
    if percent > 100.0 {
        return Err("confidence must be a fraction (0-1) or a percentage (0-100)".to_string());
    }
    Ok(percent as i64)
}

#[derive(Debug, Clone, FromRow)]
pub struct Alert {
    pub id: i64,
    pub resident_id: Option<i64>,
    /// Surrogate id of the device the alert came from, if known.
    pub device_id: Option<i64>,
    pub elderly: String,
    pub room: String,
    #[sqlx(rename = "type")]
    pub alert_type: String,
    pub confidence: f64,
    pub confidence_percent: i64,
    #[sqlx(try_from = "String")]
    pub status: AlertStatus,
    pub time: String,
    pub media_url: Option<String>,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Alert joined with its live resident name and the reporting device.
#[derive(Debug, Clone, FromRow)]
pub struct AlertView {
    #[sqlx(flatten)]
    pub alert: Alert,
    pub resident_name: Option<String>,
    pub device_external_id: Option<String>,
}

impl AlertView {
    pub fn resident_exists(&self) -> bool {
        self.resident_name.is_some()
    }

    /// Live name first, then the snapshot taken at creation.
    pub fn display_name(&self) -> String {
        self.resident_name
            .clone()
            .or_else(|| Some(self.alert.elderly.clone()).filter(|e| !e.is_empty()))
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertResponse {
    pub id: i64,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub status: AlertStatus,
    pub elderly: String,
    pub room: String,
    pub confidence: f64,
    pub confidence_percent: i64,
    pub time: String,
    pub source: String,
    pub media_url: Option<String>,
    pub resident_id: Option<i64>,
    pub device_id: Option<String>,
    pub display_name: String,
    pub resident_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resident_display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AlertResponse {
    /// Detail view: also says "Resident deleted" when the link is gone.
    pub fn detail(view: AlertView) -> Self {
        let resident_display_name = view
            .resident_name
            .clone()
            .unwrap_or_else(|| "Resident deleted".to_string());
        let mut response = Self::from(view);
        response.resident_display_name = Some(resident_display_name);
        response
    }
}

impl From<AlertView> for AlertResponse {
    fn from(view: AlertView) -> Self {
        let display_name = view.display_name();
        let resident_exists = view.resident_exists();
        let a = view.alert;
        Self {
            id: a.id,
            alert_type: a.alert_type,
            status: a.status,
            elderly: a.elderly,
            room: a.room,
            confidence: a.confidence,
            confidence_percent: a.confidence_percent,
            time: a.time,
            source: a.source,
            media_url: a.media_url,
            resident_id: a.resident_id,
            device_id: view.device_external_id,
            display_name,
            resident_exists,
            resident_display_name: None,
            created_at: a.created_at,
            acknowledged_at: a.acknowledged_at,
            resolved_at: a.resolved_at,
        }
    }
}

/// Dashboard row: alert plus resident, device and owner display fields.
#[derive(Debug, Clone, FromRow)]
pub struct AdminAlertRow {
    #[sqlx(flatten)]
    pub view: AlertView,
    pub device_name: Option<String>,
    pub owner_email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAlertResponse {
    #[serde(flatten)]
    pub alert: AlertResponse,
    pub device_name: Option<String>,
    pub owner_email: Option<String>,
}

impl From<AdminAlertRow> for AdminAlertResponse {
    fn from(row: AdminAlertRow) -> Self {
        Self {
            alert: AlertResponse::from(row.view),
            device_name: row.device_name,
            owner_email: row.owner_email,
        }
    }
}
