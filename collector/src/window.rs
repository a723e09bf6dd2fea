use chrono::{
    DateTime,
    SecondsFormat,
    Timelike,
    Utc,
};

/// The `start`/`end` range requested from the metrics view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// From the top of the current hour up to `now`.
    pub fn current_hour(now: DateTime<Utc>) -> Self {
        let start = now
            .with_nanosecond(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_minute(0))
            .unwrap_or(now);
        Self { start, end: now }
    }

    pub fn start_param(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn end_param(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}
