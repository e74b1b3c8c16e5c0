use std::{net::SocketAddrV4, num::NonZeroU64};

use serde::Serialize;

use crate::{
    alarm::{checked_duration, AlarmSignal, AlarmTimer},
    clock::ClockReading,
    config::WolConfig,
    device::{Device, DeviceRegistry},
    error::WolError,
    magic_packet::{encode, MagicPacket},
    time_format::{format_absolute, Granularity, RelativeTime},
};

/// Gap between consecutive packets of one sweep, to avoid flooding the link.
pub const PACING_DELAY_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerPhase {
    Idle,
    WaitingStartup,
    Repeating,
}

/// When the next sweep is due. Before the clock syncs the only reference
/// is the boot moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextFire {
    SinceBoot(u64),
    Unix(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepTrigger {
    Startup,
    Interval,
    Manual,
    Single,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastAction {
    Send {
        device: Device,
        packet: MagicPacket,
        target: SocketAddrV4,
    },
    Delay(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sweep {
    pub trigger: SweepTrigger,
    pub actions: Vec<BroadcastAction>,
}

impl Sweep {
    pub fn send_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|action| matches!(action, BroadcastAction::Send { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub startup_delay: NonZeroU64,
    pub repeat_interval: NonZeroU64,
    pub target: SocketAddrV4,
}

impl TryFrom<&WolConfig> for ScheduleSettings {
    type Error = WolError;

    fn try_from(config: &WolConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            startup_delay: checked_duration(config.startup_delay_secs)?,
            repeat_interval: checked_duration(config.repeat_interval_secs)?,
            target: config.target(),
        })
    }
}

#[derive(Debug)]
pub struct BroadcastScheduler {
    settings: ScheduleSettings,
    timer: AlarmTimer,
    phase: SchedulerPhase,
    has_fired_once: bool,
    next_fire: Option<NextFire>,
}

impl BroadcastScheduler {
    pub fn new(settings: ScheduleSettings) -> Self {
        Self {
            timer: AlarmTimer::with_duration(settings.startup_delay),
            settings,
            phase: SchedulerPhase::Idle,
            has_fired_once: false,
            next_fire: None,
        }
    }

    pub fn settings(&self) -> &ScheduleSettings {
        &self.settings
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn has_fired_once(&self) -> bool {
        self.has_fired_once
    }

    pub fn next_fire(&self) -> Option<NextFire> {
        self.next_fire
    }

    pub fn timer_duration_secs(&self) -> u64 {
        self.timer.duration_secs()
    }

    /// Handle for an external alarm source (interrupt, test clock).
    pub fn alarm_signal(&self) -> AlarmSignal {
        self.timer.signal()
    }

    pub fn percent_remaining(&self, now: &ClockReading) -> f32 {
        self.timer.percent_remaining(now.uptime_ms)
    }

    pub fn start(&mut self, now: &ClockReading) {
        if self.phase != SchedulerPhase::Idle {
            return;
        }
        self.timer.enable(now.uptime_ms);
        self.next_fire = Some(Self::fire_time_after(now, self.settings.startup_delay));
        self.phase = SchedulerPhase::WaitingStartup;
    }

    /// Rebases a boot-relative fire time onto the wall clock the first time
    /// the clock reports synchronized. The instant itself does not move.
    pub fn sync_clock(&mut self, now: &ClockReading) {
        if let Some(NextFire::SinceBoot(offset)) = self.next_fire {
            if let Ok(boot_epoch) = now.boot_epoch() {
                self.next_fire = Some(NextFire::Unix(epoch_after(boot_epoch, offset)));
            }
        }
    }

    pub fn poll(&mut self, now: &ClockReading, registry: &DeviceRegistry) -> Option<Sweep> {
        if self.phase == SchedulerPhase::Idle {
            return None;
        }

        self.sync_clock(now);
        self.timer.tick(now.uptime_ms);
        if !self.timer.is_expired() {
            return None;
        }
        // Clear before acting so an expiry raised during the sweep survives.
        self.timer.clear();

        let trigger = match self.phase {
            SchedulerPhase::WaitingStartup => {
                self.timer.reconfigure(self.settings.repeat_interval);
                self.timer.restart(now.uptime_ms);
                self.has_fired_once = true;
                self.phase = SchedulerPhase::Repeating;
                SweepTrigger::Startup
            }
            SchedulerPhase::Repeating => SweepTrigger::Interval,
            SchedulerPhase::Idle => return None,
        };

        Some(self.sweep(trigger, now, registry))
    }

    /// Manual trigger: the interval timer is reset before the packets go out,
    /// and `has_fired_once` is left alone.
    pub fn wake_now(&mut self, now: &ClockReading, registry: &DeviceRegistry) -> Sweep {
        self.timer.clear();
        self.timer.reconfigure(self.settings.repeat_interval);
        self.timer.restart(now.uptime_ms);
        self.sweep(SweepTrigger::Manual, now, registry)
    }

    pub fn send_to(&self, device: &Device) -> Sweep {
        Sweep {
            trigger: SweepTrigger::Single,
            actions: vec![self.send_action(device)],
        }
    }

    pub fn next_fire_text(&self, now: &ClockReading, granularity: Granularity) -> String {
        match self.next_fire {
            None => String::new(),
            Some(NextFire::SinceBoot(offset)) => match now.boot_epoch() {
                Ok(boot_epoch) => Self::absolute_text(now, epoch_after(boot_epoch, offset), granularity),
                Err(_) => RelativeTime::countdown(offset.saturating_sub(now.uptime_secs()))
                    .render(granularity),
            },
            Some(NextFire::Unix(epoch)) => Self::absolute_text(now, epoch, granularity),
        }
    }

    fn sweep(&mut self, trigger: SweepTrigger, now: &ClockReading, registry: &DeviceRegistry) -> Sweep {
        let mut actions = Vec::with_capacity(registry.count() * 2);
        for (index, device) in registry.all().iter().enumerate() {
            if index > 0 {
                actions.push(BroadcastAction::Delay(PACING_DELAY_MS));
            }
            actions.push(self.send_action(device));
        }

        if let Some(duration) = NonZeroU64::new(self.timer.duration_secs()) {
            self.next_fire = Some(Self::fire_time_after(now, duration));
        }

        Sweep { trigger, actions }
    }

    fn send_action(&self, device: &Device) -> BroadcastAction {
        BroadcastAction::Send {
            device: device.clone(),
            packet: encode(device.mac),
            target: self.settings.target,
        }
    }

    fn fire_time_after(now: &ClockReading, duration: NonZeroU64) -> NextFire {
        match now.local {
            Some(local) => NextFire::Unix(epoch_after(local.timestamp(), duration.get())),
            None => NextFire::SinceBoot(now.uptime_secs().saturating_add(duration.get())),
        }
    }

    fn absolute_text(now: &ClockReading, epoch: i64, granularity: Granularity) -> String {
        now.at_unix(epoch)
            .map(|time| format_absolute(&time, granularity))
            .unwrap_or_default()
    }
}

fn epoch_after(epoch: i64, secs: u64) -> i64 {
    epoch.saturating_add(i64::try_from(secs).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{clock::tests::local, magic_packet::MacAddress};

    fn settings(startup: u64, repeat: u64) -> ScheduleSettings {
        ScheduleSettings {
            startup_delay: NonZeroU64::new(startup).unwrap(),
            repeat_interval: NonZeroU64::new(repeat).unwrap(),
            target: SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 255), 9),
        }
    }

    fn registry(count: u8) -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        for i in 0..count {
            registry.add(Device::new(
                format!("host{i}"),
                MacAddress::new([0x02, 0, 0, 0, 0, i]),
            ));
        }
        registry
    }

    fn at(secs: u64) -> ClockReading {
        ClockReading::unsynchronized(secs * 1_000)
    }

    #[test]
    fn start_arms_startup_delay() {
        let mut scheduler = BroadcastScheduler::new(settings(120, 600));
        assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
        assert_eq!(scheduler.poll(&at(500), &registry(1)), None);

        scheduler.start(&at(0));

        assert_eq!(scheduler.phase(), SchedulerPhase::WaitingStartup);
        assert_eq!(scheduler.next_fire(), Some(NextFire::SinceBoot(120)));
        assert_eq!(scheduler.timer_duration_secs(), 120);
        assert!(!scheduler.has_fired_once());
    }

    #[test]
    fn first_expiry_switches_to_repeat_interval() {
        let devices = registry(2);
        let mut scheduler = BroadcastScheduler::new(settings(120, 600));
        scheduler.start(&at(0));

        assert_eq!(scheduler.poll(&at(119), &devices), None);

        let sweep = scheduler.poll(&at(120), &devices).unwrap();
        assert_eq!(sweep.trigger, SweepTrigger::Startup);
        assert_eq!(sweep.send_count(), 2);
        assert_eq!(scheduler.phase(), SchedulerPhase::Repeating);
        assert_eq!(scheduler.timer_duration_secs(), 600);
        assert!(scheduler.has_fired_once());
        assert_eq!(scheduler.next_fire(), Some(NextFire::SinceBoot(720)));

        assert_eq!(scheduler.poll(&at(719), &devices), None);

        for cycle in 1..=3u64 {
            let fire_at = 120 + cycle * 600;
            let sweep = scheduler.poll(&at(fire_at), &devices).unwrap();
            assert_eq!(sweep.trigger, SweepTrigger::Interval);
            assert_eq!(scheduler.phase(), SchedulerPhase::Repeating);
            assert_eq!(scheduler.timer_duration_secs(), 600);
            assert_eq!(
                scheduler.next_fire(),
                Some(NextFire::SinceBoot(fire_at + 600))
            );
        }
    }

    #[test]
    fn sweep_paces_sends_in_registry_order() {
        let devices = registry(3);
        let mut scheduler = BroadcastScheduler::new(settings(1, 60));
        scheduler.start(&at(0));

        let sweep = scheduler.poll(&at(1), &devices).unwrap();
        let shape: Vec<_> = sweep
            .actions
            .iter()
            .map(|action| match action {
                BroadcastAction::Send { device, target, .. } => {
                    format!("send {} -> {target}", device.name)
                }
                BroadcastAction::Delay(ms) => format!("delay {ms}"),
            })
            .collect();

        assert_eq!(
            shape,
            vec![
                "send host0 -> 192.168.1.255:9",
                "delay 50",
                "send host1 -> 192.168.1.255:9",
                "delay 50",
                "send host2 -> 192.168.1.255:9",
            ]
        );

        let BroadcastAction::Send { packet, .. } = &sweep.actions[0] else {
            panic!("first action should be a send");
        };
        assert_eq!(packet, &encode(devices.all()[0].mac));
    }

    #[test]
    fn empty_registry_still_reschedules() {
        let mut scheduler = BroadcastScheduler::new(settings(10, 30));
        scheduler.start(&at(0));

        let sweep = scheduler.poll(&at(10), &DeviceRegistry::new()).unwrap();

        assert!(sweep.actions.is_empty());
        assert_eq!(scheduler.next_fire(), Some(NextFire::SinceBoot(40)));
    }

    #[test]
    fn wake_now_resets_interval_without_marking_first_sweep() {
        let devices = registry(2);
        let mut scheduler = BroadcastScheduler::new(settings(120, 600));
        scheduler.start(&at(0));

        let sweep = scheduler.wake_now(&at(30), &devices);

        assert_eq!(sweep.trigger, SweepTrigger::Manual);
        assert_eq!(sweep.send_count(), 2);
        assert!(!scheduler.has_fired_once());
        assert_eq!(scheduler.phase(), SchedulerPhase::WaitingStartup);
        assert_eq!(scheduler.timer_duration_secs(), 600);
        assert_eq!(scheduler.next_fire(), Some(NextFire::SinceBoot(630)));

        assert_eq!(scheduler.poll(&at(120), &devices), None);
        let sweep = scheduler.poll(&at(630), &devices).unwrap();
        assert_eq!(sweep.trigger, SweepTrigger::Startup);
        assert!(scheduler.has_fired_once());
    }

    #[test]
    fn wake_now_discards_a_pending_expiry() {
        let devices = registry(1);
        let mut scheduler = BroadcastScheduler::new(settings(10, 60));
        scheduler.start(&at(0));
        scheduler.alarm_signal().raise();

        scheduler.wake_now(&at(5), &devices);

        assert_eq!(scheduler.poll(&at(6), &devices), None);
    }

    #[test]
    fn externally_raised_alarm_fires_on_next_poll() {
        let devices = registry(1);
        let mut scheduler = BroadcastScheduler::new(settings(3_600, 600));
        scheduler.start(&at(0));

        scheduler.alarm_signal().raise();
        let sweep = scheduler.poll(&at(5), &devices).unwrap();

        assert_eq!(sweep.trigger, SweepTrigger::Startup);
        assert_eq!(scheduler.poll(&at(6), &devices), None);
    }

    #[test]
    fn send_to_leaves_schedule_untouched() {
        let mut scheduler = BroadcastScheduler::new(settings(120, 600));
        scheduler.start(&at(0));
        let device = Device::new("tv", MacAddress::new([1, 2, 3, 4, 5, 6]));

        let sweep = scheduler.send_to(&device);

        assert_eq!(sweep.trigger, SweepTrigger::Single);
        assert_eq!(sweep.send_count(), 1);
        assert_eq!(scheduler.next_fire(), Some(NextFire::SinceBoot(120)));
    }

    #[test]
    fn countdown_before_sync() {
        let mut scheduler = BroadcastScheduler::new(settings(93_800, 600));
        scheduler.start(&at(0));

        let now = at(16);
        assert_eq!(
            scheduler.next_fire_text(&now, Granularity::Full),
            "in 1d 2h 3m 4s"
        );
        assert_eq!(scheduler.next_fire_text(&now, Granularity::DateOnly), "in 1d");
        assert_eq!(
            scheduler.next_fire_text(&now, Granularity::TimeOnly),
            "2h 3m 4s"
        );
    }

    #[test]
    fn sync_rebases_onto_wall_clock() {
        let devices = registry(1);
        let mut scheduler = BroadcastScheduler::new(settings(120, 600));
        scheduler.start(&at(0));

        let synced = ClockReading::synchronized(20_000, local(10, 0, 0));
        assert_eq!(
            scheduler.next_fire_text(&synced, Granularity::Full),
            "2026-03-14 10:01:40"
        );

        assert_eq!(scheduler.poll(&synced, &devices), None);
        assert_eq!(
            scheduler.next_fire(),
            Some(NextFire::Unix(local(10, 1, 40).timestamp()))
        );

        let later = ClockReading::synchronized(120_000, local(10, 1, 40));
        scheduler.poll(&later, &devices).unwrap();
        assert_eq!(
            scheduler.next_fire_text(&later, Granularity::TimeOnly),
            "10:11:40"
        );
    }

    #[test]
    fn huge_delay_saturates_instead_of_wrapping() {
        let mut scheduler = BroadcastScheduler::new(settings(u64::MAX, u64::MAX));
        scheduler.start(&at(5));
        assert_eq!(scheduler.next_fire(), Some(NextFire::SinceBoot(u64::MAX)));

        let synced = ClockReading::synchronized(5_000, local(10, 0, 0));
        assert_eq!(scheduler.poll(&synced, &registry(1)), None);
        assert_eq!(scheduler.next_fire(), Some(NextFire::Unix(i64::MAX)));

        let mut scheduler = BroadcastScheduler::new(settings(u64::MAX, 600));
        scheduler.start(&synced);
        let Some(NextFire::Unix(epoch)) = scheduler.next_fire() else {
            panic!("synced start should schedule on the wall clock");
        };
        assert!(epoch >= local(10, 0, 0).timestamp());
        assert_eq!(scheduler.next_fire_text(&synced, Granularity::Full), "");
    }

    #[test]
    fn rejects_durations_past_millisecond_range_from_config() {
        let config = WolConfig {
            startup_delay_secs: 120,
            repeat_interval_secs: u64::MAX,
            port: 9,
            broadcast: Ipv4Addr::BROADCAST,
        };

        assert_eq!(
            ScheduleSettings::try_from(&config),
            Err(WolError::InvalidDuration)
        );
    }

    #[test]
    fn rejects_zero_durations_from_config() {
        let config = WolConfig {
            startup_delay_secs: 0,
            repeat_interval_secs: 600,
            port: 9,
            broadcast: Ipv4Addr::BROADCAST,
        };

        assert_eq!(
            ScheduleSettings::try_from(&config),
            Err(WolError::InvalidDuration)
        );
    }
}
