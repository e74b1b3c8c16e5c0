use std::{
    num::NonZeroU64,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::error::WolError;

/// Longest accepted period: the period in milliseconds must fit an `i64`.
pub const MAX_DURATION_SECS: u64 = i64::MAX as u64 / 1_000;

/// Accepts a period in `1..=MAX_DURATION_SECS`.
pub fn checked_duration(duration_secs: u64) -> Result<NonZeroU64, WolError> {
    NonZeroU64::new(duration_secs)
        .filter(|secs| secs.get() <= MAX_DURATION_SECS)
        .ok_or(WolError::InvalidDuration)
}

/// Producer half of an alarm's expiry flag.
///
/// Whatever drives the alarm (an interrupt handler, or [`AlarmTimer::tick`]
/// in a simulated setup) may only raise the flag. Clearing belongs to the
/// control loop.
#[derive(Debug, Clone)]
pub struct AlarmSignal(Arc<AtomicBool>);

impl AlarmSignal {
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Auto-reloading periodic alarm, modelled on a hardware timer with a
/// seconds-resolution alarm value.
#[derive(Debug)]
pub struct AlarmTimer {
    duration_secs: NonZeroU64,
    period_start_ms: u64,
    enabled: bool,
    expired: Arc<AtomicBool>,
}

impl AlarmTimer {
    pub fn new(duration_secs: u64) -> Result<Self, WolError> {
        checked_duration(duration_secs).map(Self::with_duration)
    }

    pub fn with_duration(duration_secs: NonZeroU64) -> Self {
        Self {
            duration_secs,
            period_start_ms: 0,
            enabled: false,
            expired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs.get()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn signal(&self) -> AlarmSignal {
        AlarmSignal(Arc::clone(&self.expired))
    }

    /// Changes the alarm period. Elapsed time is kept; call [`restart`] to
    /// begin a fresh period at the new length.
    ///
    /// [`restart`]: AlarmTimer::restart
    pub fn configure(&mut self, duration_secs: u64) -> Result<(), WolError> {
        self.reconfigure(checked_duration(duration_secs)?);
        Ok(())
    }

    pub fn reconfigure(&mut self, duration_secs: NonZeroU64) {
        self.duration_secs = duration_secs;
    }

    pub fn enable(&mut self, now_ms: u64) {
        if !self.enabled {
            self.enabled = true;
            self.period_start_ms = now_ms;
        }
    }

    pub fn restart(&mut self, now_ms: u64) {
        self.enabled = true;
        self.period_start_ms = now_ms;
    }

    /// Advances the simulated counter. Every completed period raises the
    /// expiry flag and reloads; several missed periods collapse into one
    /// expiry, like a latched hardware interrupt.
    pub fn tick(&mut self, now_ms: u64) {
        if !self.enabled {
            return;
        }

        let period_ms = self.period_ms();
        let elapsed = now_ms.saturating_sub(self.period_start_ms);
        if elapsed >= period_ms {
            self.period_start_ms += (elapsed / period_ms) * period_ms;
            self.signal().raise();
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.expired.store(false, Ordering::Release);
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        if !self.enabled {
            return 0;
        }
        now_ms
            .saturating_sub(self.period_start_ms)
            .min(self.period_ms())
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.period_ms().saturating_sub(self.elapsed_ms(now_ms))
    }

    pub fn percent_remaining(&self, now_ms: u64) -> f32 {
        let percent = 100.0 * self.remaining_ms(now_ms) as f32 / self.period_ms() as f32;
        percent.clamp(0.0, 100.0)
    }

    fn period_ms(&self) -> u64 {
        self.duration_secs.get().saturating_mul(1_000)
    }
}
