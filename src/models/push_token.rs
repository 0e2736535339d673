use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushToken {
    pub id: i64,
    pub token: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// FCM registration tokens are long and drawn from a URL-safe alphabet.
pub fn validate_token(raw: &str) -> Result<String, &'static str> {
    let cleaned = raw.trim();
    if cleaned.len() < 100 {
        return Err("Invalid token format (too short to be real FCM token)");
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':');
    if !cleaned.chars().all(allowed) {
        return Err("Invalid token format (unexpected characters)");
    }
    Ok(cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_validation() {
        let good = format!("  {}:{}  ", "a".repeat(60), "B-_9".repeat(15));
        assert_eq!(validate_token(&good).unwrap(), good.trim());

        assert!(validate_token("short").is_err());
        let bad = format!("{}!", "a".repeat(120));
        assert_eq!(
            validate_token(&bad),
            Err("Invalid token format (unexpected characters)")
        );
    }
}
