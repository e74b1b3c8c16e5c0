use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};

use crate::error::WolError;

const SYNC_STREAM: [u8; 6] = [0xFF; 6];
const MAC_REPETITIONS: usize = 16;

pub const MAC_LEN: usize = 6;
pub const MAGIC_PACKET_LEN: usize = SYNC_STREAM.len() + MAC_REPETITIONS * MAC_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddress([u8; MAC_LEN]);

impl MacAddress {
    pub const fn new(octets: [u8; MAC_LEN]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; MAC_LEN] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for MacAddress {
    type Err = WolError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        parse_mac(text)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parses `AA:BB:CC:DD:EE:FF` or `AA-BB-CC-DD-EE-FF`. Mixed separators,
/// bare hex strings and single-digit octets are rejected.
pub fn parse_mac(text: &str) -> Result<MacAddress, WolError> {
    let invalid = || WolError::InvalidMacFormat(text.to_string());

    let separator = if text.contains(':') { ':' } else { '-' };
    let mut octets = [0u8; MAC_LEN];
    let mut count = 0;

    for part in text.split(separator) {
        if count == MAC_LEN {
            return Err(invalid());
        }
        if part.len() != 2 || !part.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        octets[count] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        count += 1;
    }

    if count != MAC_LEN {
        return Err(invalid());
    }

    Ok(MacAddress(octets))
}

#[derive(Clone, PartialEq, Eq)]
pub struct MagicPacket([u8; MAGIC_PACKET_LEN]);

impl MagicPacket {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MagicPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = MacAddress(
            self.0[SYNC_STREAM.len()..SYNC_STREAM.len() + MAC_LEN]
                .try_into()
                .unwrap_or([0; MAC_LEN]),
        );
        write!(f, "MagicPacket({target})")
    }
}

pub fn encode(mac: MacAddress) -> MagicPacket {
    let mut packet = [0u8; MAGIC_PACKET_LEN];
    packet[..SYNC_STREAM.len()].copy_from_slice(&SYNC_STREAM);
    for chunk in packet[SYNC_STREAM.len()..].chunks_exact_mut(MAC_LEN) {
        chunk.copy_from_slice(&mac.0);
    }
    MagicPacket(packet)
}
