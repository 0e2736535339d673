use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::clock::{self, LocalClock};
use crate::context::AppContext;
use crate::db::{queries, DbPool};
use crate::models::alert::{DEVICE_OFFLINE, SYSTEM_ELDERLY};
use crate::models::device::Device;

/// Failures in a row before the loop raises the alarm.
const FAILURE_ALARM_THRESHOLD: u32 = 5;
const SYSTEM_SOURCE: &str = "system";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub offline: usize,
    pub created: usize,
}

/// One pass over the active devices. Offline is judged against `now`, taken
/// once at the start; each device gets at most one open offline alert.
pub async fn sweep_once(
    pool: &DbPool,
    clock: &LocalClock,
    now: DateTime<Utc>,
    threshold: chrono::Duration,
) -> anyhow::Result<SweepReport> {
    let devices = sqlx::query_as::<_, Device>(queries::SELECT_SWEEP_CANDIDATES)
        .fetch_all(pool)
        .await?;

    let mut report = SweepReport {
        checked: devices.len(),
        ..Default::default()
    };
    let time = clock.short_time(now);

    for device in devices.iter().filter(|d| d.is_offline(now, threshold)) {
        report.offline += 1;
        let room = device.room.as_deref().unwrap_or("Unknown");

        let inserted = sqlx::query(queries::INSERT_OFFLINE_ALERT)
            .bind(device.id)
            .bind(SYSTEM_ELDERLY)
            .bind(room)
            .bind(DEVICE_OFFLINE)
            .bind(&time)
            .bind(SYSTEM_SOURCE)
            .bind(now)
            .execute(pool)
            .await?
            .rows_affected();

        if inserted > 0 {
            report.created += 1;
            warn!("Device {} in {} went offline", device.device_id, room);
        }
    }
    Ok(report)
}

/// Runs the sweep on a fixed interval until `shutdown` flips to true.
/// A failing pass is logged and the next tick still runs a pass.
pub async fn run(ctx: AppContext, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_secs(ctx.config.sweep_interval_secs.max(1));
    let threshold = chrono::Duration::seconds(ctx.config.offline_after_secs);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut consecutive_failures: u32 = 0;

    info!(
        "Offline sweep every {:?}, threshold {}s",
        period, ctx.config.offline_after_secs
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        match sweep_once(&ctx.pool, &ctx.clock, clock::now(), threshold).await {
            Ok(report) => {
                if consecutive_failures >= FAILURE_ALARM_THRESHOLD {
                    info!(
                        "Offline sweep recovered after {} failed passes",
                        consecutive_failures
                    );
                }
                consecutive_failures = 0;
                debug!(
                    "Sweep checked {} devices, {} offline, {} new alerts",
                    report.checked, report.offline, report.created
                );
            }
            Err(e) => {
                consecutive_failures += 1;
                if consecutive_failures == FAILURE_ALARM_THRESHOLD {
                    warn!(
                        "Offline sweep failed {} times in a row, offline alerts are stalled",
                        consecutive_failures
                    );
                }
                error!(
                    "Offline sweep failed ({} in a row): {:#}",
                    consecutive_failures, e
                );
            }
        }
    }

    info!("Offline sweep stopped");
}
