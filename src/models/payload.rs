//! Bodies posted by the on-site units (Pi cameras and sensors).
//!
//! Firmware is inconsistent about quoting numbers, so numeric fields accept
//! either a JSON number or a numeric string.

use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    pub device_id: Option<String>,
    pub name: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(default, deserialize_with = "parse_i64_option")]
    pub resident_id: Option<i64>,
    pub elderly: Option<String>,
    pub room: Option<String>,
    #[serde(rename = "type")]
    pub alert_type: Option<String>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub confidence: Option<f64>,
    pub time: Option<String>,
    pub media_url: Option<String>,
    pub source: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Float(f64),
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Option<StringOrNumber> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrNumber::Float(f)) => Ok(Some(f)),
        Some(StringOrNumber::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}

fn parse_i64_option<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match parse_f64_option(deserializer)? {
        Some(f) if f.fract() == 0.0 && f >= 1.0 && f <= i64::MAX as f64 => Ok(Some(f as i64)),
        Some(f) => Err(serde::de::Error::custom(format!("invalid id {}", f))),
        None => Ok(None),
    }
}
