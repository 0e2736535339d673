use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, SubsecRound, Utc};

/// Current time at whole-second precision, the resolution every stored
/// timestamp uses so text comparisons in SQL stay ordered.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Wall-clock conversions for the deployment's local zone.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    pub fn from_offset_minutes(minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    /// "hh:mm AM" snapshot stored on alerts.
    pub fn short_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format("%I:%M %p").to_string()
    }

    /// Local midnight of the day containing `at`, expressed in UTC.
    pub fn start_of_day(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let local_midnight = at
            .with_timezone(&self.offset)
            .date_naive()
            .and_time(NaiveTime::MIN);
        (local_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }
}
