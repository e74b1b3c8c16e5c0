use std::net::Ipv4Addr;

use serde::Serialize;

use crate::{
    alarm::AlarmTimer,
    clock::ClockReading,
    config::{ApplianceConfig, NetworkConfig},
    device::{Device, DeviceRegistry},
    display::{
        render_page, Canvas, DisplayState, Header, PageBody, Section, SplitTime, StatusPage,
        DEVICES_PER_PAGE,
    },
    error::WolError,
    magic_packet::parse_mac,
    scheduler::{BroadcastScheduler, SchedulerPhase, ScheduleSettings, Sweep, SweepTrigger},
    time_format::{self, Granularity},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Up,
    Down,
    Hash,
    Star,
}

impl Button {
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'u' | 'U' => Some(Self::Up),
            'd' | 'D' => Some(Self::Down),
            '#' => Some(Self::Hash),
            '*' => Some(Self::Star),
            _ => None,
        }
    }
}

/// What one control-loop iteration asks the host to do.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoopOutcome {
    pub sweeps: Vec<Sweep>,
    pub redraw: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplianceStatus {
    pub hostname: String,
    pub ip: Ipv4Addr,
    pub phase: SchedulerPhase,
    pub first_sweep_sent: bool,
    pub next_wol: String,
    pub current_time: String,
    pub boot_time: String,
    pub percent_remaining: f32,
    pub clock_synchronized: bool,
    pub uptime_secs: u64,
    pub device_count: usize,
}

/// Everything the control loop mutates: registry, schedule, page state and
/// the display refresh timer.
#[derive(Debug)]
pub struct Appliance {
    network: NetworkConfig,
    timezone: String,
    registry: DeviceRegistry,
    scheduler: BroadcastScheduler,
    display: DisplayState,
    refresh: AlarmTimer,
}

impl Appliance {
    pub fn new(config: &ApplianceConfig, registry: DeviceRegistry) -> Result<Self, WolError> {
        Ok(Self {
            network: config.network.clone(),
            timezone: config.timezone.clone(),
            registry,
            scheduler: BroadcastScheduler::new(ScheduleSettings::try_from(&config.wol)?),
            display: DisplayState::new(),
            refresh: AlarmTimer::new(config.display.refresh_secs)?,
        })
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &BroadcastScheduler {
        &self.scheduler
    }

    pub fn section(&self) -> Section {
        self.display.section()
    }

    pub fn start(&mut self, now: &ClockReading) {
        self.scheduler.start(now);
        self.refresh.enable(now.uptime_ms);
    }

    pub fn poll(&mut self, now: &ClockReading, buttons: &[Button]) -> LoopOutcome {
        let mut outcome = LoopOutcome::default();

        if let Some(sweep) = self.scheduler.poll(now, &self.registry) {
            if sweep.trigger == SweepTrigger::Startup {
                self.display.return_to_status();
            }
            outcome.sweeps.push(sweep);
            outcome.redraw = true;
        }

        let mut handled = Vec::with_capacity(buttons.len());
        for &button in buttons {
            if handled.contains(&button) {
                continue;
            }
            handled.push(button);

            let count = self.registry.count();
            match button {
                Button::Up => {
                    self.display.previous(count);
                }
                Button::Down => {
                    self.display.next(count);
                }
                Button::Star => outcome.sweeps.push(self.wake_now(now)),
                Button::Hash => continue,
            }
            outcome.redraw = true;
        }

        self.refresh.tick(now.uptime_ms);
        if self.refresh.is_expired() {
            self.refresh.clear();
            outcome.redraw = true;
        }

        outcome
    }

    pub fn wake_now(&mut self, now: &ClockReading) -> Sweep {
        self.scheduler.wake_now(now, &self.registry)
    }

    /// Wakes a single MAC, registering it first when it is not known yet.
    pub fn wake_device(&mut self, name: Option<&str>, mac_text: &str) -> Result<Sweep, WolError> {
        let mac = parse_mac(mac_text.trim())?;
        let device = match self.registry.get(&mac) {
            Some(device) => device.clone(),
            None => {
                let device = Device::labelled(name.unwrap_or_default(), mac);
                self.registry.add(device.clone());
                device
            }
        };
        Ok(self.scheduler.send_to(&device))
    }

    pub fn render(&self, now: &ClockReading, canvas: &mut impl Canvas) {
        let header = Header {
            ip: self.network.ip,
            first_sweep_pending: !self.scheduler.has_fired_once(),
            percent_remaining: self.scheduler.percent_remaining(now),
        };

        match self.display.section() {
            Section::Status => {
                let status = StatusPage {
                    next_wol: SplitTime::render_with(|g| self.scheduler.next_fire_text(now, g)),
                    current_time: SplitTime::render_with(|g| time_format::current_time(now, g)),
                    boot_time: SplitTime::render_with(|g| time_format::boot_time(now, g)),
                };
                render_page(canvas, &header, &PageBody::Status(status));
            }
            Section::Network => render_page(
                canvas,
                &header,
                &PageBody::Network {
                    network: &self.network,
                    timezone: &self.timezone,
                },
            ),
            Section::Devices { page } => render_page(
                canvas,
                &header,
                &PageBody::Devices(self.registry.page(page, DEVICES_PER_PAGE)),
            ),
        }
    }

    pub fn status(&self, now: &ClockReading) -> ApplianceStatus {
        ApplianceStatus {
            hostname: self.network.hostname.clone(),
            ip: self.network.ip,
            phase: self.scheduler.phase(),
            first_sweep_sent: self.scheduler.has_fired_once(),
            next_wol: self.scheduler.next_fire_text(now, Granularity::Full),
            current_time: time_format::current_time(now, Granularity::Full),
            boot_time: time_format::boot_time(now, Granularity::Full),
            percent_remaining: self.scheduler.percent_remaining(now),
            clock_synchronized: now.is_synchronized(),
            uptime_secs: now.uptime_secs(),
            device_count: self.registry.count(),
        }
    }
}
