pub mod alarm;
pub mod appliance;
pub mod clock;
pub mod config;
pub mod device;
pub mod display;
pub mod error;
pub mod magic_packet;
pub mod scheduler;
pub mod time_format;

pub use alarm::{AlarmSignal, AlarmTimer};
pub use appliance::{Appliance, ApplianceStatus, Button, LoopOutcome};
pub use clock::ClockReading;
pub use config::{ApplianceConfig, DeviceEntry, DisplayConfig, NetworkConfig, WebConfig, WolConfig};
pub use device::{Device, DeviceRegistry};
pub use display::{render_message, Canvas, Section};
pub use error::WolError;
pub use magic_packet::{encode, parse_mac, MacAddress, MagicPacket};
pub use scheduler::{BroadcastAction, BroadcastScheduler, SchedulerPhase, Sweep, SweepTrigger};
pub use time_format::Granularity;
