use chrono::{DateTime, Duration, FixedOffset};

use crate::error::WolError;

/// One observation of time for a control-loop iteration.
///
/// `local` is only present once the network time source reports ready; before
/// that, the appliance only knows how long it has been running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    pub uptime_ms: u64,
    pub local: Option<DateTime<FixedOffset>>,
}

impl ClockReading {
    pub fn unsynchronized(uptime_ms: u64) -> Self {
        Self {
            uptime_ms,
            local: None,
        }
    }

    pub fn synchronized(uptime_ms: u64, local: DateTime<FixedOffset>) -> Self {
        Self {
            uptime_ms,
            local: Some(local),
        }
    }

    pub fn is_synchronized(&self) -> bool {
        self.local.is_some()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.uptime_ms / 1_000
    }

    pub fn local_time(&self) -> Result<DateTime<FixedOffset>, WolError> {
        self.local.ok_or(WolError::ClockUnsynchronized)
    }

    pub fn boot_time(&self) -> Result<DateTime<FixedOffset>, WolError> {
        let local = self.local_time()?;
        Ok(local - Duration::seconds(self.uptime_secs() as i64))
    }

    /// Unix time at which the appliance booted, i.e. the offset between the
    /// boot-relative clock and the real one.
    pub fn boot_epoch(&self) -> Result<i64, WolError> {
        self.boot_time().map(|boot| boot.timestamp())
    }

    pub fn at_unix(&self, epoch: i64) -> Result<DateTime<FixedOffset>, WolError> {
        let local = self.local_time()?;
        DateTime::from_timestamp(epoch, 0)
            .map(|utc| utc.with_timezone(local.offset()))
            .ok_or(WolError::ClockUnsynchronized)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::TimeZone;

    use super::*;

    pub(crate) fn local(hour: u32, minute: u32, second: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(12 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 14, hour, minute, second)
            .unwrap()
    }

    #[test]
    fn unsynchronized_clock_reports_mode() {
        let now = ClockReading::unsynchronized(5_000);

        assert!(!now.is_synchronized());
        assert_eq!(now.local_time(), Err(WolError::ClockUnsynchronized));
        assert_eq!(now.boot_time(), Err(WolError::ClockUnsynchronized));
    }

    #[test]
    fn boot_time_subtracts_uptime() {
        let now = ClockReading::synchronized(3_725_400, local(10, 0, 0));

        assert_eq!(now.boot_time().unwrap(), local(8, 57, 55));
        assert_eq!(
            now.boot_epoch().unwrap(),
            local(10, 0, 0).timestamp() - 3_725
        );
    }

    #[test]
    fn unix_times_keep_the_local_offset() {
        let now = ClockReading::synchronized(0, local(10, 0, 0));
        let later = now.at_unix(local(11, 30, 0).timestamp()).unwrap();

        assert_eq!(later, local(11, 30, 0));
        assert_eq!(later.offset(), local(0, 0, 0).offset());
    }
}
