use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub log_level: String,
    pub api_key: String,
    pub jwt_secret: String,
    pub jwt_ttl_days: i64,
    pub utc_offset_minutes: i32,
    pub offline_after_secs: i64,
    pub sweep_interval_secs: u64,
    pub external_timeout_secs: u64,
    pub upload_max_bytes: usize,
    pub fcm_service_account_path: Option<PathBuf>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub media_folder: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let port = parse_or("PORT", 3001);
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://ultracare.db?mode=rwc".into());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let api_key = required("API_KEY")?;
        let jwt_secret = required("JWT_SECRET")?;
        let jwt_ttl_days = parse_or("JWT_TTL_DAYS", 30);

        // Asia/Bangkok
        let utc_offset_minutes = parse_or("UTC_OFFSET_MINUTES", 7 * 60);

        let offline_after_secs = parse_or("OFFLINE_AFTER_SECS", 120);
        let sweep_interval_secs = parse_or("SWEEP_INTERVAL_SECS", 30);
        let external_timeout_secs = parse_or("EXTERNAL_TIMEOUT_SECS", 15);
        let upload_max_bytes = parse_or("UPLOAD_MAX_BYTES", 20 * 1024 * 1024);

        let fcm_service_account_path = env::var("FCM_SERVICE_ACCOUNT_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let cloudinary = match (
            env::var("CLOUDINARY_CLOUD_NAME"),
            env::var("CLOUDINARY_API_KEY"),
            env::var("CLOUDINARY_API_SECRET"),
        ) {
            (Ok(cloud_name), Ok(api_key), Ok(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };
        let media_folder =
            env::var("MEDIA_FOLDER").unwrap_or_else(|_| "ultracare/falls".to_string());

        Ok(Self {
            port,
            database_url,
            log_level,
            api_key,
            jwt_secret,
            jwt_ttl_days,
            utc_offset_minutes,
            offline_after_secs,
            sweep_interval_secs,
            external_timeout_secs,
            upload_max_bytes,
            fcm_service_account_path,
            cloudinary,
            media_folder,
        })
    }
}

fn required(key: &str) -> Result<String> {
    let value = env::var(key).with_context(|| format!("Missing {} in environment", key))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} must not be empty", key);
    }
    Ok(value)
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            log_level: "debug".to_string(),
            api_key: "test-api-key".to_string(),
            jwt_secret: "test-jwt-secret".to_string(),
            jwt_ttl_days: 30,
            utc_offset_minutes: 7 * 60,
            offline_after_secs: 120,
            sweep_interval_secs: 30,
            external_timeout_secs: 5,
            upload_max_bytes: 1024 * 1024,
            fcm_service_account_path: None,
            cloudinary: None,
            media_folder: "ultracare/test".to_string(),
        }
    }
}
