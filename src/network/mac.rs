//! MAC addresses for tap interfaces
//!
//! New taps get an address derived from a seed, so the same owner and tap
//! name always map to the same MAC across runs.

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Vendor prefix used for derived addresses (Xen/QEMU range)
pub const MAC_PREFIX: [u8; 3] = [0x00, 0x16, 0x3e];

/// A six-byte hardware address
#[repr(transparent)]
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Random locally administered unicast address
    pub fn random() -> Self {
        let mut bytes: [u8; 6] = rand::random();
        bytes[0] = (bytes[0] | 0b0000_0010) & !0b0000_0001;
        Self(bytes)
    }

    pub const fn is_local(&self) -> bool {
        (self.0[0] & 0b0000_0010) != 0
    }

    pub const fn is_multicast(&self) -> bool {
        (self.0[0] & 0b0000_0001) != 0
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidMac(s.to_string());

        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(bytes))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Derive a MAC address from a seed string
///
/// The top three bytes of the seed's CRC-32 (IEEE) follow [`MAC_PREFIX`].
/// Distinct seeds collide with the odds of a 24-bit space, which is fine
/// for the taps of one host but not a uniqueness guarantee.
pub fn derive_mac(seed: &str) -> MacAddr {
    let hash = crc32fast::hash(seed.as_bytes()).to_be_bytes();
    MacAddr([
        MAC_PREFIX[0],
        MAC_PREFIX[1],
        MAC_PREFIX[2],
        hash[0],
        hash[1],
        hash[2],
    ])
}

/// Derive a tap interface name from a seed string
///
/// Yields `tap<crc32>`, at most 13 characters.
pub fn derive_tap_name(seed: &str) -> String {
    format!("tap{}", crc32fast::hash(seed.as_bytes()))
}
