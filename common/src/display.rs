use std::net::Ipv4Addr;

use crate::{config::NetworkConfig, device::Device, time_format::Granularity};

pub const DEVICES_PER_PAGE: usize = 3;
pub const PANEL_WIDTH: u32 = 128;
pub const PANEL_HEIGHT: u32 = 64;

const BODY_TOP: u32 = 24;
const ROW_HEIGHT: u32 = 8;
const PROGRESS_TOP: u32 = 10;
const PROGRESS_HEIGHT: u32 = 4;
const FIRST_SWEEP_MARK_X: u32 = 122;
const CONTINUATION: &str = "           ";

/// Monochrome text panel with an off-screen buffer.
pub trait Canvas {
    fn clear_buffer(&mut self);
    /// `y` is the text baseline.
    fn draw_text(&mut self, x: u32, y: u32, text: &str);
    fn draw_box(&mut self, x: u32, y: u32, width: u32, height: u32);
    fn send_buffer(&mut self);
}

pub fn device_page_count(device_count: usize) -> usize {
    device_count.div_ceil(DEVICES_PER_PAGE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Status,
    Network,
    Devices { page: usize },
}

impl Section {
    pub fn next(self, device_count: usize) -> Self {
        let pages = device_page_count(device_count);
        match self {
            Self::Status if pages > 0 => Self::Devices { page: 0 },
            Self::Status => Self::Network,
            Self::Devices { page } if page + 1 < pages => Self::Devices { page: page + 1 },
            Self::Devices { .. } => Self::Network,
            Self::Network => Self::Status,
        }
    }

    pub fn previous(self, device_count: usize) -> Self {
        let pages = device_page_count(device_count);
        match self {
            Self::Status => Self::Network,
            Self::Network if pages > 0 => Self::Devices { page: pages - 1 },
            Self::Network => Self::Status,
            Self::Devices { page } if page > 0 => Self::Devices { page: page - 1 },
            Self::Devices { .. } => Self::Status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayState {
    section: Section,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            section: Section::Status,
        }
    }
}

impl DisplayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn next(&mut self, device_count: usize) -> Section {
        self.section = self.section.next(device_count);
        self.section
    }

    pub fn previous(&mut self, device_count: usize) -> Section {
        self.section = self.section.previous(device_count);
        self.section
    }

    pub fn return_to_status(&mut self) {
        self.section = Section::Status;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    pub ip: Ipv4Addr,
    pub first_sweep_pending: bool,
    pub percent_remaining: f32,
}

impl Header {
    fn draw(&self, canvas: &mut impl Canvas) {
        canvas.draw_text(0, ROW_HEIGHT, &format!("IP: {}", self.ip));
        if self.first_sweep_pending {
            canvas.draw_text(FIRST_SWEEP_MARK_X, ROW_HEIGHT, "1");
        }
        let width = (PANEL_WIDTH as f32 / 100.0 * self.percent_remaining.clamp(0.0, 100.0)) as u32;
        canvas.draw_box(0, PROGRESS_TOP, width, PROGRESS_HEIGHT);
    }
}

/// A timestamp split over the date line and the time line of the status page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitTime {
    pub date: String,
    pub time: String,
}

impl SplitTime {
    pub fn render_with(render: impl Fn(Granularity) -> String) -> Self {
        Self {
            date: render(Granularity::DateOnly),
            time: render(Granularity::TimeOnly),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusPage {
    pub next_wol: SplitTime,
    pub current_time: SplitTime,
    pub boot_time: SplitTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageBody<'a> {
    Status(StatusPage),
    Network {
        network: &'a NetworkConfig,
        timezone: &'a str,
    },
    Devices(&'a [Device]),
}

/// Full redraw: header first, then the body, then one buffer transfer.
pub fn render_page(canvas: &mut impl Canvas, header: &Header, body: &PageBody<'_>) {
    canvas.clear_buffer();
    header.draw(canvas);

    match body {
        PageBody::Status(status) => {
            let rows = [
                ("Next WOL : ", &status.next_wol),
                ("Cur. Time: ", &status.current_time),
                ("Boot Time: ", &status.boot_time),
            ];
            for (index, (label, split)) in rows.into_iter().enumerate() {
                let y = BODY_TOP + 2 * ROW_HEIGHT * index as u32;
                canvas.draw_text(0, y, &format!("{label}{}", split.date));
                canvas.draw_text(0, y + ROW_HEIGHT, &format!("{CONTINUATION}{}", split.time));
            }
        }
        PageBody::Network { network, timezone } => {
            let lines = [
                format!("GW:   {}", network.gateway),
                format!("NM:   {}", network.subnet),
                format!("DNS:  {}", network.dns),
                format!("NTP1: {}", network.ntp1),
                format!("NTP2: {}", network.ntp2.as_deref().unwrap_or("")),
                timezone.to_string(),
            ];
            draw_lines(canvas, BODY_TOP, &lines);
        }
        PageBody::Devices(devices) if devices.is_empty() => {
            canvas.draw_text(0, BODY_TOP, "No devices");
        }
        PageBody::Devices(devices) => {
            for (pos, device) in devices.iter().take(DEVICES_PER_PAGE).enumerate() {
                let y = BODY_TOP + 2 * ROW_HEIGHT * pos as u32;
                canvas.draw_text(0, y, &format!("{}:", device.name));
                canvas.draw_text(0, y + ROW_HEIGHT, &format!("   {}", device.mac));
            }
        }
    }

    canvas.send_buffer();
}

/// Full-screen notice without the header, used when the appliance cannot run.
pub fn render_message(canvas: &mut impl Canvas, title: &str, body: &str) {
    canvas.clear_buffer();
    canvas.draw_text(0, ROW_HEIGHT, title);
    let lines: Vec<&str> = body.lines().collect();
    draw_lines(canvas, BODY_TOP, &lines);
    canvas.send_buffer();
}

fn draw_lines<S: AsRef<str>>(canvas: &mut impl Canvas, top: u32, lines: &[S]) {
    for (index, line) in lines.iter().enumerate() {
        let y = top + ROW_HEIGHT * index as u32;
        if y > PANEL_HEIGHT {
            break;
        }
        canvas.draw_text(0, y, line.as_ref());
    }
}
