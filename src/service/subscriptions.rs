use tracing::info;

use crate::clock;
use crate::db::{queries, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::models::subscription::{Plan, Subscription, SubscriptionStatus};

pub async fn current(pool: &DbPool, user_id: i64) -> ApiResult<Option<Subscription>> {
    let sub = sqlx::query_as::<_, Subscription>(queries::SELECT_SUBSCRIPTION_BY_USER)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(sub)
}

/// Idempotent: selecting again resets status to the plan's starting point.
pub async fn select(pool: &DbPool, user_id: i64, plan: Option<&str>) -> ApiResult<Subscription> {
    let plan = plan
        .and_then(|p| Plan::try_from(p.to_string()).ok())
        .ok_or_else(|| ApiError::validation("plan must be FREE or PRO"))?;
    let status = plan.initial_status();

    let sub = sqlx::query_as::<_, Subscription>(queries::UPSERT_SUBSCRIPTION)
        .bind(user_id)
        .bind(plan.as_str())
        .bind(status.as_str())
        .bind(clock::now())
        .fetch_one(pool)
        .await?;

    info!("User {} selected {} ({})", user_id, plan.as_str(), status.as_str());
    Ok(sub)
}

pub async fn confirm_payment(pool: &DbPool, user_id: i64) -> ApiResult<Subscription> {
    let sub = sqlx::query_as::<_, Subscription>(queries::CONFIRM_PAYMENT)
        .bind(user_id)
        .bind(clock::now())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::validation("No subscription selected yet"))?;

    info!("User {} payment confirmed, PRO active", user_id);
    Ok(sub)
}

/// Gate for the mobile-app surface: a plan must be chosen, and PRO must be paid.
pub async fn require_usable(pool: &DbPool, user_id: i64) -> ApiResult<Subscription> {
    let sub = current(pool, user_id).await?.ok_or_else(|| {
        ApiError::forbidden("Please choose a subscription plan first.")
            .with_detail("code", "SUBSCRIPTION_REQUIRED")
    })?;

    if sub.plan == Plan::Pro && sub.status != SubscriptionStatus::Active {
        return Err(ApiError::forbidden("PRO plan not active yet.")
            .with_detail("code", "SUBSCRIPTION_NOT_ACTIVE")
            .with_detail("status", sub.status.as_str()));
    }
    Ok(sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn free_is_active_immediately() {
        let ctx = testing::context().await;
        let user = testing::user(&ctx.pool, "a@b.co").await;

        let sub = select(&ctx.pool, user.id, Some("FREE")).await.unwrap();
        assert_eq!(sub.plan, Plan::Free);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.device_limit(), 2);
        assert!(require_usable(&ctx.pool, user.id).await.is_ok());
    }

    #[tokio::test]
    async fn pro_needs_payment_confirmation() {
        let ctx = testing::context().await;
        let user = testing::user(&ctx.pool, "a@b.co").await;

        let sub = select(&ctx.pool, user.id, Some("PRO")).await.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::PendingPayment);
        assert!(matches!(
            require_usable(&ctx.pool, user.id).await,
            Err(ApiError::Forbidden { .. })
        ));

        let sub = confirm_payment(&ctx.pool, user.id).await.unwrap();
        assert_eq!(sub.plan, Plan::Pro);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.device_limit(), 4);

        // Re-selecting is an upsert, not a second row.
        let again = select(&ctx.pool, user.id, Some("PRO")).await.unwrap();
        assert_eq!(again.id, sub.id);
        assert_eq!(again.status, SubscriptionStatus::PendingPayment);
    }

    #[tokio::test]
    async fn confirm_without_selection_and_bad_plan() {
        let ctx = testing::context().await;
        let user = testing::user(&ctx.pool, "a@b.co").await;

        assert!(matches!(
            confirm_payment(&ctx.pool, user.id).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            select(&ctx.pool, user.id, Some("GOLD")).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            select(&ctx.pool, user.id, None).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            require_usable(&ctx.pool, user.id).await,
            Err(ApiError::Forbidden { .. })
        ));
    }
}
