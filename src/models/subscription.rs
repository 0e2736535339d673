use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    Free,
    Pro,
}

impl Plan {
    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "FREE",
            Plan::Pro => "PRO",
        }
    }

    /// How many devices a user on this plan may claim.
    pub fn device_limit(self) -> i64 {
        match self {
            Plan::Free => 2,
            Plan::Pro => 4,
        }
    }

    /// Status a fresh selection of this plan starts in.
    pub fn initial_status(self) -> SubscriptionStatus {
        match self {
            Plan::Free => SubscriptionStatus::Active,
            Plan::Pro => SubscriptionStatus::PendingPayment,
        }
    }
}

impl TryFrom<String> for Plan {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "FREE" => Ok(Plan::Free),
            "PRO" => Ok(Plan::Pro),
            other => Err(format!("unknown plan '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    PendingPayment,
    Active,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::PendingPayment => "PENDING_PAYMENT",
            SubscriptionStatus::Active => "ACTIVE",
        }
    }
}

impl TryFrom<String> for SubscriptionStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "PENDING_PAYMENT" => Ok(SubscriptionStatus::PendingPayment),
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            other => Err(format!("unknown subscription status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(try_from = "String")]
    pub plan: Plan,
    #[sqlx(try_from = "String")]
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn device_limit(&self) -> i64 {
        self.plan.device_limit()
    }
}
