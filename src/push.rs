//! Push notification delivery.
//!
//! Handlers only see [`PushSender`]; production wires in [`FcmClient`], which
//! talks to the FCM HTTP v1 API with a service-account OAuth token.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Failure codes after which a token is dead and should be forgotten.
const INVALID_TOKEN_CODES: [&str; 3] = [
    "messaging/registration-token-not-registered",
    "messaging/invalid-registration-token",
    "messaging/invalid-argument",
];

#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Error)]
pub enum PushError {
    #[error("push notifications are not configured")]
    NotConfigured,

    /// The messaging service answered and refused this token or message.
    #[error("{message}")]
    Rejected { code: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl PushError {
    pub fn code(&self) -> Option<&str> {
        match self {
            PushError::Rejected { code, .. } => Some(code),
            PushError::NotConfigured => Some("messaging/not-configured"),
            PushError::Transport(_) => None,
        }
    }

    pub fn is_invalid_token(&self) -> bool {
        self.code().is_some_and(|c| INVALID_TOKEN_CODES.contains(&c))
    }
}

#[async_trait]
pub trait PushSender: Send + Sync {
    /// Sends to one device token and returns the service's message id.
    async fn send(&self, token: &str, message: &PushMessage) -> Result<String, PushError>;
}

/// Sends to every token concurrently; results come back in token order.
pub async fn send_multicast(
    sender: &dyn PushSender,
    tokens: &[String],
    message: &PushMessage,
) -> Vec<Result<String, PushError>> {
    join_all(tokens.iter().map(|t| sender.send(t, message))).await
}

/// Used when no service account is configured.
pub struct DisabledPush;

#[async_trait]
impl PushSender for DisabledPush {
    async fn send(&self, _token: &str, _message: &PushMessage) -> Result<String, PushError> {
        Err(PushError::NotConfigured)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

pub struct FcmClient {
    http: reqwest::Client,
    account: ServiceAccount,
    endpoint: String,
    access_token: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl FcmClient {
    pub fn from_file(path: &Path, timeout: Duration) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading service account {}", path.display()))?;
        let account: ServiceAccount =
            serde_json::from_str(&raw).context("parsing service account JSON")?;
        Self::new(account, timeout)
    }

    pub fn new(account: ServiceAccount, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        let endpoint = format!(
            "https://fcm.googleapis.com/v1/projects/{}/messages:send",
            account.project_id
        );
        Ok(Self {
            http,
            account,
            endpoint,
            access_token: Mutex::new(None),
        })
    }

    /// Cached OAuth token, refreshed a minute before it lapses.
    async fn access_token(&self) -> Result<String, PushError> {
        let mut cached = self.access_token.lock().await;
        let now = Utc::now();
        if let Some((token, expires_at)) = cached.as_ref() {
            if *expires_at - chrono::Duration::seconds(60) > now {
                return Ok(token.clone());
            }
        }

        #[derive(Serialize)]
        struct GrantClaims<'a> {
            iss: &'a str,
            scope: &'a str,
            aud: &'a str,
            iat: i64,
            exp: i64,
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let claims = GrantClaims {
            iss: &self.account.client_email,
            scope: FCM_SCOPE,
            aud: &self.account.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + 3600,
        };
        let key = EncodingKey::from_rsa_pem(self.account.private_key.as_bytes())
            .map_err(|e| PushError::Transport(format!("invalid service account key: {}", e)))?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| PushError::Transport(format!("signing grant failed: {}", e)))?;

        let response = self
            .http
            .post(&self.account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Transport(format!(
                "token exchange failed ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;
        debug!("Minted FCM access token, valid {}s", token.expires_in);
        let expires_at = now + chrono::Duration::seconds(token.expires_in);
        *cached = Some((token.access_token.clone(), expires_at));
        Ok(token.access_token)
    }
}

#[async_trait]
impl PushSender for FcmClient {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<String, PushError> {
        #[derive(Deserialize)]
        struct SendResponse {
            name: String,
        }

        let access_token = self.access_token().await?;
        let body = json!({
            "message": {
                "token": token,
                "notification": { "title": message.title, "body": message.body },
                "apns": { "payload": { "aps": { "sound": "default" } } },
            }
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        if response.status().is_success() {
            let sent: SendResponse = response
                .json()
                .await
                .map_err(|e| PushError::Transport(e.to_string()))?;
            return Ok(sent.name);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let err = rejection_from_body(&text)
            .unwrap_or_else(|| PushError::Transport(format!("FCM returned {}: {}", status, text)));
        warn!("FCM rejected token ({}): {}", status, err);
        Err(err)
    }
}

/// Maps an FCM v1 error body onto the `messaging/*` codes clients know.
fn rejection_from_body(body: &str) -> Option<PushError> {
    #[derive(Deserialize)]
    struct Envelope {
        error: ErrorBody,
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        status: Option<String>,
        #[serde(default)]
        details: Vec<serde_json::Value>,
    }

    let envelope: Envelope = serde_json::from_str(body).ok()?;
    let detail_code = envelope
        .error
        .details
        .iter()
        .find_map(|d| d.get("errorCode").and_then(|c| c.as_str()).map(str::to_string));
    let raw = detail_code.or(envelope.error.status)?;

    let code = match raw.as_str() {
        "UNREGISTERED" | "NOT_FOUND" => "messaging/registration-token-not-registered",
        "INVALID_ARGUMENT" => "messaging/invalid-argument",
        "SENDER_ID_MISMATCH" => "messaging/mismatched-credential",
        "QUOTA_EXCEEDED" => "messaging/message-rate-exceeded",
        "UNAVAILABLE" => "messaging/server-unavailable",
        "INTERNAL" => "messaging/internal-error",
        "THIRD_PARTY_AUTH_ERROR" => "messaging/third-party-auth-error",
        _ => "messaging/unknown-error",
    };
    Some(PushError::Rejected {
        code: code.to_string(),
        message: envelope.error.message.unwrap_or(raw),
    })
}

/// Picks FCM when a service account is configured.
pub fn sender_from_config(
    service_account: Option<&Path>,
    timeout: Duration,
) -> Result<Arc<dyn PushSender>> {
    match service_account {
        Some(path) => Ok(Arc::new(FcmClient::from_file(path, timeout)?)),
        None => {
            warn!("FCM_SERVICE_ACCOUNT_PATH not set; push delivery disabled");
            Ok(Arc::new(DisabledPush))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_token_is_pruned() {
        let body = r#"{
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND",
                "details": [
                    {
                        "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                        "errorCode": "UNREGISTERED"
                    }
                ]
            }
        }"#;
        let err = rejection_from_body(body).unwrap();
        assert_eq!(err.code(), Some("messaging/registration-token-not-registered"));
        assert!(err.is_invalid_token());
    }

    #[test]
    fn quota_errors_keep_the_token() {
        let body = r#"{"error":{"code":429,"message":"slow down","status":"RESOURCE_EXHAUSTED",
            "details":[{"errorCode":"QUOTA_EXCEEDED"}]}}"#;
        let err = rejection_from_body(body).unwrap();
        assert_eq!(err.code(), Some("messaging/message-rate-exceeded"));
        assert!(!err.is_invalid_token());
        assert_eq!(err.to_string(), "slow down");
    }

    #[test]
    fn non_json_body_is_not_a_rejection() {
        assert!(rejection_from_body("<html>bad gateway</html>").is_none());
        assert!(!PushError::Transport("timeout".into()).is_invalid_token());
    }

    #[tokio::test]
    async fn multicast_preserves_token_order() {
        struct EvenOnly;

        #[async_trait]
        impl PushSender for EvenOnly {
            async fn send(&self, token: &str, _m: &PushMessage) -> Result<String, PushError> {
                if token.len() % 2 == 0 {
                    Ok(format!("msg-{}", token))
                } else {
                    Err(PushError::Transport("odd".into()))
                }
            }
        }

        let tokens = vec!["aa".to_string(), "b".to_string(), "cccc".to_string()];
        let message = PushMessage {
            title: "t".into(),
            body: "b".into(),
        };
        let results = send_multicast(&EvenOnly, &tokens, &message).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), "msg-aa");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap(), "msg-cccc");
    }
}
