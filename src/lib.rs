//! tapfleet - tap interface and bridge fleet manager
//!
//! Tracks the tap interfaces and bridges that give virtual machines host
//! networking, reconciles that model with `ip link` listings, and creates,
//! attaches and tears down the taps it owns through iproute2.

pub mod error;
pub mod manager;
pub mod manifest;
pub mod network;
pub mod runner;

pub use error::{Error, Result};
pub use manager::{FleetSnapshot, Manager, ManagerOptions};
pub use network::{Bridge, MacAddr, Tap, derive_mac, derive_tap_name};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
