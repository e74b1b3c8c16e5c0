use std::net::{Ipv4Addr, SocketAddrV4};

use serde::{Deserialize, Serialize};

use crate::{alarm::checked_duration, error::WolError};

pub const DEFAULT_WEB_PORT: u16 = 8080;
pub const DEFAULT_DISPLAY_REFRESH_SECS: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub name: String,
    pub mac: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkConfig {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub dns: Ipv4Addr,
    pub hostname: String,
    pub ntp1: String,
    pub ntp2: Option<String>,
}

impl NetworkConfig {
    pub fn directed_broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.ip) | !u32::from(self.subnet))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WolConfig {
    pub startup_delay_secs: u64,
    pub repeat_interval_secs: u64,
    pub port: u16,
    pub broadcast: Ipv4Addr,
}

impl WolConfig {
    pub fn target(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.broadcast, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub port: u16,
    /// Hex SHA-256 of the bearer token clients must present.
    pub token_sha256: Option<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: DEFAULT_WEB_PORT,
            token_sha256: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub refresh_secs: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_secs: DEFAULT_DISPLAY_REFRESH_SECS,
        }
    }
}

impl DisplayConfig {
    pub fn sanitize(&mut self) {
        self.refresh_secs = self.refresh_secs.clamp(1, 60);
    }
}

/// Validated appliance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplianceConfig {
    pub network: NetworkConfig,
    pub timezone: String,
    pub wol: WolConfig,
    pub web: WebConfig,
    pub display: DisplayConfig,
    pub devices: Vec<DeviceEntry>,
}

// File shape: everything optional so absent keys surface as
// `ConfigurationMissing` with the field path instead of a serde message.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    network: Option<RawNetwork>,
    timezone: Option<String>,
    wol: Option<RawWol>,
    web: Option<WebConfig>,
    display: Option<DisplayConfig>,
    devices: Option<Vec<DeviceEntry>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNetwork {
    ip: Option<Ipv4Addr>,
    gateway: Option<Ipv4Addr>,
    subnet: Option<Ipv4Addr>,
    dns: Option<Ipv4Addr>,
    hostname: Option<String>,
    ntp1: Option<String>,
    ntp2: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawWol {
    startup_delay_secs: Option<u64>,
    repeat_interval_secs: Option<u64>,
    port: Option<u16>,
    broadcast: Option<Ipv4Addr>,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, WolError> {
    value.ok_or(WolError::ConfigurationMissing(field))
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, WolError> {
    let text = required(value, field)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(WolError::ConfigurationMissing(field));
    }
    Ok(trimmed.to_string())
}

impl ApplianceConfig {
    pub fn from_json(raw: &[u8]) -> Result<Self, WolError> {
        let raw: RawConfig = serde_json::from_slice(raw)
            .map_err(|err| WolError::ConfigurationMalformed(err.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, WolError> {
        let network = required(raw.network, "network")?;
        let network = NetworkConfig {
            ip: required(network.ip, "network.ip")?,
            gateway: required(network.gateway, "network.gateway")?,
            subnet: required(network.subnet, "network.subnet")?,
            dns: required(network.dns, "network.dns")?,
            hostname: required_text(network.hostname, "network.hostname")?,
            ntp1: required_text(network.ntp1, "network.ntp1")?,
            ntp2: network
                .ntp2
                .map(|server| server.trim().to_string())
                .filter(|server| !server.is_empty()),
        };

        let timezone = required_text(raw.timezone, "timezone")?;

        let wol = required(raw.wol, "wol")?;
        let startup_delay_secs = required(wol.startup_delay_secs, "wol.startup_delay_secs")?;
        let repeat_interval_secs =
            required(wol.repeat_interval_secs, "wol.repeat_interval_secs")?;
        checked_duration(startup_delay_secs)?;
        checked_duration(repeat_interval_secs)?;
        let wol = WolConfig {
            startup_delay_secs,
            repeat_interval_secs,
            port: required(wol.port, "wol.port")?,
            broadcast: wol
                .broadcast
                .unwrap_or_else(|| network.directed_broadcast()),
        };

        let web = raw.web.unwrap_or_default();
        if web.enabled && web.token_sha256.as_deref().map_or(true, str::is_empty) {
            return Err(WolError::ConfigurationMissing("web.token_sha256"));
        }

        let mut display = raw.display.unwrap_or_default();
        display.sanitize();

        let devices = required(raw.devices, "devices")?;

        Ok(Self {
            network,
            timezone,
            wol,
            web,
            display,
            devices,
        })
    }
}
