use serde::Serialize;
use tracing::{error, info, warn};

use super::non_empty;
use crate::clock;
use crate::context::AppContext;
use crate::db::{queries, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::models::push_token::{validate_token, PushToken};
use crate::push::{self, PushMessage};

pub const DEFAULT_PLATFORM: &str = "ios";
/// Most tokens a single test broadcast will address.
const MULTICAST_LIMIT: i64 = 500;

#[derive(Debug, Serialize)]
pub struct DeliveryFailure {
    pub token: String,
    pub code: Option<String>,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
    pub failures: Vec<DeliveryFailure>,
}

pub async fn register(
    pool: &DbPool,
    token: Option<String>,
    platform: Option<String>,
) -> ApiResult<PushToken> {
    let raw = non_empty(token).ok_or_else(|| ApiError::validation("token is required"))?;
    let token = validate_token(&raw).map_err(ApiError::validation)?;
    let platform = non_empty(platform)
        .map(|p| p.to_lowercase())
        .unwrap_or_else(|| DEFAULT_PLATFORM.to_string());

    let saved = sqlx::query_as::<_, PushToken>(queries::UPSERT_PUSH_TOKEN)
        .bind(&token)
        .bind(&platform)
        .bind(clock::now())
        .fetch_one(pool)
        .await?;
    info!("Push token {} saved for {}", saved.id, saved.platform);
    Ok(saved)
}

fn message(title: Option<String>, body: Option<String>) -> ApiResult<PushMessage> {
    match (non_empty(title), non_empty(body)) {
        (Some(title), Some(body)) => Ok(PushMessage { title, body }),
        _ => Err(ApiError::validation("title and body are required")),
    }
}

/// Broadcasts to every saved iOS token and forgets the ones the messaging
/// service says are dead.
pub async fn send_test(
    ctx: &AppContext,
    title: Option<String>,
    body: Option<String>,
) -> ApiResult<BroadcastReport> {
    let message = message(title, body)?;

    let tokens: Vec<String> =
        sqlx::query_as::<_, PushToken>(queries::SELECT_PUSH_TOKENS_BY_PLATFORM)
        .bind(DEFAULT_PLATFORM)
        .bind(MULTICAST_LIMIT)
        .fetch_all(&ctx.pool)
        .await?
        .into_iter()
        .map(|t| t.token)
        .collect();
    if tokens.is_empty() {
        return Err(ApiError::not_found("No iOS tokens saved yet"));
    }

    let results = push::send_multicast(ctx.push.as_ref(), &tokens, &message).await;

    let mut failures = Vec::new();
    for (token, result) in tokens.iter().zip(results) {
        let Err(err) = result else { continue };
        if err.is_invalid_token() {
            sqlx::query(queries::DELETE_PUSH_TOKEN)
                .bind(token)
                .execute(&ctx.pool)
                .await?;
            info!("Pruned dead push token ({})", err.code().unwrap_or("unknown"));
        }
        failures.push(DeliveryFailure {
            token: token.clone(),
            code: err.code().map(str::to_string),
            error: err.to_string(),
        });
    }

    let report = BroadcastReport {
        attempted: tokens.len(),
        sent: tokens.len() - failures.len(),
        failed: failures.len(),
        failures,
    };
    if report.failed > 0 {
        warn!("Test push: {} sent, {} failed", report.sent, report.failed);
    }
    Ok(report)
}

/// Sends to one token and returns the message id.
pub async fn send_one(
    ctx: &AppContext,
    token: Option<String>,
    title: Option<String>,
    body: Option<String>,
) -> ApiResult<String> {
    let token = non_empty(token).ok_or_else(|| ApiError::validation("token is required"))?;
    let message = message(title, body)?;

    ctx.push.send(&token, &message).await.map_err(|e| {
        error!("Push to single token failed: {}", e);
        ApiError::Internal(anyhow::anyhow!("push delivery failed: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{self, FakePush};

    #[tokio::test]
    async fn register_validates_and_upserts() {
        let ctx = testing::context().await;
        let token = testing::push_token("a");

        let first = register(&ctx.pool, Some(format!(" {} ", token)), None).await.unwrap();
        assert_eq!(first.token, token);
        assert_eq!(first.platform, "ios");

        let again = register(&ctx.pool, Some(token.clone()), Some("Android".into())).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.platform, "android");

        assert!(matches!(
            register(&ctx.pool, Some("short".into()), None).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            register(&ctx.pool, None, None).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn send_test_reports_and_prunes() {
        let good = testing::push_token("good");
        let dead = testing::push_token("dead");
        let busy = testing::push_token("busy");
        let fake = Arc::new(FakePush::failing(&[
            (dead.as_str(), "messaging/registration-token-not-registered"),
            (busy.as_str(), "messaging/message-rate-exceeded"),
        ]));
        let ctx = testing::context_with_push(fake.clone()).await;

        let none = send_test(&ctx, Some("t".into()), Some("b".into())).await;
        assert!(matches!(none, Err(ApiError::NotFound(_))));

        for token in [&good, &dead, &busy] {
            register(&ctx.pool, Some(token.clone()), None).await.unwrap();
        }
        let missing_body = send_test(&ctx, Some("t".into()), None).await;
        assert!(matches!(missing_body, Err(ApiError::Validation(_))));

        let report = send_test(&ctx, Some("Hello".into()), Some("World".into())).await.unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.failures[0].token, dead);
        assert_eq!(
            report.failures[0].code.as_deref(),
            Some("messaging/registration-token-not-registered")
        );
        assert_eq!(fake.sent_tokens(), vec![good.clone()]);

        // Only the dead token is gone.
        let second = send_test(&ctx, Some("Hello".into()), Some("again".into())).await.unwrap();
        assert_eq!(second.attempted, 2);
    }

    #[tokio::test]
    async fn send_one_returns_message_id() {
        let ctx = testing::context().await;
        let id = send_one(&ctx, Some("any-token".into()), Some("t".into()), Some("b".into()))
            .await
            .unwrap();
        assert!(id.starts_with("projects/test/messages/"));

        let dead = Arc::new(FakePush::failing(&[("x", "messaging/invalid-argument")]));
        let ctx = testing::context_with_push(dead).await;
        let failed = send_one(&ctx, Some("x".into()), Some("t".into()), Some("b".into())).await;
        assert!(matches!(failed, Err(ApiError::Internal(_))));
    }
}
