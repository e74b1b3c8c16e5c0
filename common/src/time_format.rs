use chrono::{DateTime, FixedOffset};

use crate::clock::ClockReading;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Full,
    DateOnly,
    TimeOnly,
}

pub fn format_absolute(time: &DateTime<FixedOffset>, granularity: Granularity) -> String {
    let pattern = match granularity {
        Granularity::Full => "%F %H:%M:%S",
        Granularity::DateOnly => "%F",
        Granularity::TimeOnly => "%H:%M:%S",
    };
    time.format(pattern).to_string()
}

/// Span of seconds broken into `1d 2h 3m 4s` tokens, with optional leading
/// and trailing words (`in ...`, `... ago`).
///
/// The date/time split mirrors the two-line layout of the status page: the
/// date line takes the first two tokens and the time line takes the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeTime {
    tokens: Vec<String>,
}

impl RelativeTime {
    pub fn new(total_secs: u64) -> Self {
        let days = total_secs / SECS_PER_DAY;
        let hours = total_secs % SECS_PER_DAY / SECS_PER_HOUR;
        let minutes = total_secs % SECS_PER_HOUR / SECS_PER_MINUTE;
        let seconds = total_secs % SECS_PER_MINUTE;

        let mut tokens = Vec::with_capacity(6);
        for (value, unit) in [(days, "d"), (hours, "h"), (minutes, "m")] {
            if value != 0 {
                tokens.push(format!("{value}{unit}"));
            }
        }
        tokens.push(format!("{seconds}s"));

        Self { tokens }
    }

    pub fn countdown(total_secs: u64) -> Self {
        let mut relative = Self::new(total_secs);
        relative.tokens.insert(0, "in".to_string());
        relative
    }

    pub fn ago(total_secs: u64) -> Self {
        let mut relative = Self::new(total_secs);
        relative.tokens.push("ago".to_string());
        relative
    }

    pub fn render(&self, granularity: Granularity) -> String {
        match granularity {
            Granularity::Full => self.tokens.join(" "),
            Granularity::DateOnly => self.tokens[..self.tokens.len().min(2)].join(" "),
            Granularity::TimeOnly => self.tokens.get(2..).unwrap_or_default().join(" "),
        }
    }
}

/// Wall-clock time, or an empty string while the clock is unsynchronized.
pub fn current_time(now: &ClockReading, granularity: Granularity) -> String {
    now.local_time()
        .map(|local| format_absolute(&local, granularity))
        .unwrap_or_default()
}

/// Boot moment as an absolute time once synchronized, otherwise how long
/// ago the appliance started.
pub fn boot_time(now: &ClockReading, granularity: Granularity) -> String {
    match now.boot_time() {
        Ok(boot) => format_absolute(&boot, granularity),
        Err(_) => RelativeTime::ago(now.uptime_secs()).render(granularity),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::clock::tests::local;

    #[test]
    fn omits_zero_leading_units() {
        let relative = RelativeTime::new(3_725);

        assert_eq!(relative.render(Granularity::Full), "1h 2m 5s");
        assert_eq!(relative.render(Granularity::DateOnly), "1h 2m");
        assert_eq!(relative.render(Granularity::TimeOnly), "5s");
    }

    #[test]
    fn always_keeps_seconds() {
        assert_eq!(RelativeTime::new(0).render(Granularity::Full), "0s");
        assert_eq!(RelativeTime::new(120).render(Granularity::Full), "2m 0s");
        assert_eq!(
            RelativeTime::new(86_400 + 4).render(Granularity::Full),
            "1d 4s"
        );
    }

    #[test]
    fn countdown_splits_after_first_unit() {
        let countdown = RelativeTime::countdown(93_784);

        assert_eq!(countdown.render(Granularity::Full), "in 1d 2h 3m 4s");
        assert_eq!(countdown.render(Granularity::DateOnly), "in 1d");
        assert_eq!(countdown.render(Granularity::TimeOnly), "2h 3m 4s");
    }

    #[test]
    fn short_spans_leave_time_line_empty() {
        let ago = RelativeTime::ago(7);

        assert_eq!(ago.render(Granularity::Full), "7s ago");
        assert_eq!(ago.render(Granularity::DateOnly), "7s ago");
        assert_eq!(ago.render(Granularity::TimeOnly), "");
    }

    #[test]
    fn absolute_granularities() {
        let time = local(9, 5, 3);

        assert_eq!(
            format_absolute(&time, Granularity::Full),
            "2026-03-14 09:05:03"
        );
        assert_eq!(format_absolute(&time, Granularity::DateOnly), "2026-03-14");
        assert_eq!(format_absolute(&time, Granularity::TimeOnly), "09:05:03");
    }

    #[test]
    fn falls_back_to_uptime_before_sync() {
        let unsynced = ClockReading::unsynchronized(3_725_000);

        assert_eq!(current_time(&unsynced, Granularity::Full), "");
        assert_eq!(boot_time(&unsynced, Granularity::Full), "1h 2m 5s ago");

        let synced = ClockReading::synchronized(3_725_000, local(10, 0, 0));
        assert_eq!(boot_time(&synced, Granularity::TimeOnly), "08:57:55");
        assert_eq!(current_time(&synced, Granularity::DateOnly), "2026-03-14");
    }
}
