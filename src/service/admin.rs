use serde::Serialize;
use tracing::error;

use crate::clock;
use crate::context::AppContext;
use crate::db::queries;
use crate::models::alert::{AdminAlertResponse, AdminAlertRow};

const RECENT_ALERTS: i64 = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_household_admins: Option<i64>,
    pub active_pro_subscriptions: Option<i64>,
    pub total_devices: Option<i64>,
    pub alerts_today: Option<i64>,
    pub recent_alerts: Vec<AdminAlertResponse>,
    /// Names of the figures that could not be computed.
    pub partial_failures: Vec<&'static str>,
}

/// Platform-wide figures for the dashboard. Each one is computed on its own;
/// a failing figure is logged, left empty and named in `partial_failures`.
pub async fn dashboard(ctx: &AppContext) -> DashboardStats {
    let pool = &ctx.pool;
    let since = ctx.clock.start_of_day(clock::now());

    let (admins, pro, devices, today, recent) = tokio::join!(
        sqlx::query_scalar::<_, i64>(queries::COUNT_USERS).fetch_one(pool),
        sqlx::query_scalar::<_, i64>(queries::COUNT_ACTIVE_PRO_SUBSCRIPTIONS).fetch_one(pool),
        sqlx::query_scalar::<_, i64>(queries::COUNT_DEVICES).fetch_one(pool),
        sqlx::query_scalar::<_, i64>(queries::COUNT_ALERTS_SINCE)
            .bind(since)
            .fetch_one(pool),
        recent_alerts(ctx),
    );

    let mut failures = Vec::new();
    let mut part = |name: &'static str, result: Result<i64, sqlx::Error>| match result {
        Ok(v) => Some(v),
        Err(e) => {
            error!("Dashboard figure {} failed: {}", name, e);
            failures.push(name);
            None
        }
    };
    let total_household_admins = part("totalHouseholdAdmins", admins);
    let active_pro_subscriptions = part("activeProSubscriptions", pro);
    let total_devices = part("totalDevices", devices);
    let alerts_today = part("alertsToday", today);
    let recent_alerts = match recent {
        Ok(rows) => rows,
        Err(e) => {
            error!("Dashboard figure recentAlerts failed: {}", e);
            failures.push("recentAlerts");
            Vec::new()
        }
    };

    DashboardStats {
        total_household_admins,
        active_pro_subscriptions,
        total_devices,
        alerts_today,
        recent_alerts,
        partial_failures: failures,
    }
}

async fn recent_alerts(ctx: &AppContext) -> Result<Vec<AdminAlertResponse>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AdminAlertRow>(queries::SELECT_RECENT_ALERTS_ENRICHED)
        .bind(RECENT_ALERTS)
        .fetch_all(&ctx.pool)
        .await?;
    Ok(rows.into_iter().map(AdminAlertResponse::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payload::EventPayload;
    use crate::models::subscription::Plan;
    use crate::service::{alerts, devices, residents};
    use crate::testing;

    #[tokio::test]
    async fn empty_platform() {
        let ctx = testing::context().await;
        let stats = dashboard(&ctx).await;
        assert_eq!(stats.total_household_admins, Some(0));
        assert_eq!(stats.alerts_today, Some(0));
        assert!(stats.recent_alerts.is_empty());
        assert!(stats.partial_failures.is_empty());
    }

    #[tokio::test]
    async fn counts_and_enriched_recent_alerts() {
        let ctx = testing::context().await;
        let owner = testing::user(&ctx.pool, "owner@b.co").await;
        testing::user(&ctx.pool, "free@b.co").await;
        let sub = testing::subscription(&ctx.pool, owner.id, Plan::Pro).await;

        let cam = testing::seen_device(&ctx.pool, "CAM-1", "201", chrono::Duration::zero()).await;
        devices::register(&ctx.pool, Some("CAM-2".into()), None, None).await.unwrap();
        devices::claim(&ctx.pool, owner.id, &sub, Some("CAM-1".into())).await.unwrap();
        devices::update(
            &ctx.pool,
            cam.id,
            devices::DevicePatch {
                name: Some(Some("Bedroom cam".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let aung = residents::create(&ctx.pool, Some("Aung".into()), Some("201".into()))
            .await
            .unwrap();
        residents::assign_device(&ctx.pool, aung.id, Some(cam.id)).await.unwrap();

        let event = EventPayload {
            resident_id: Some(aung.id),
            alert_type: Some("Fall detected".into()),
            confidence: Some(0.9),
            ..Default::default()
        };
        alerts::create(&ctx, event).await.unwrap();

        let stats = dashboard(&ctx).await;
        assert_eq!(stats.total_household_admins, Some(2));
        assert_eq!(stats.active_pro_subscriptions, Some(1));
        assert_eq!(stats.total_devices, Some(2));
        assert_eq!(stats.alerts_today, Some(1));
        assert_eq!(stats.recent_alerts.len(), 1);

        let json = serde_json::to_value(&stats).unwrap();
        let recent = &json["recentAlerts"][0];
        assert_eq!(recent["displayName"], "Aung");
        assert_eq!(recent["deviceId"], "CAM-1");
        assert_eq!(recent["deviceName"], "Bedroom cam");
        assert_eq!(recent["ownerEmail"], "owner@b.co");
        assert_eq!(json["partialFailures"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn failing_figure_is_reported_not_raised() {
        let ctx = testing::context().await;
        sqlx::query("DROP TABLE subscriptions;").execute(&ctx.pool).await.unwrap();

        let stats = dashboard(&ctx).await;
        assert_eq!(stats.active_pro_subscriptions, None);
        assert_eq!(stats.partial_failures, vec!["activeProSubscriptions"]);
        assert_eq!(stats.total_devices, Some(0));
    }
}
