//! Tap and bridge model for VM host networking
//!
//! Provides:
//! - Tap and bridge entities tracked by the manager
//! - The `ip` command surface used to change host state
//! - Parsing of `ip link show` listings
//! - MAC address derivation for new taps

pub mod bridge;
pub mod iproute;
pub mod mac;
pub mod parse;
pub mod tap;

pub use bridge::Bridge;
pub use iproute::IpCommand;
pub use mac::{MacAddr, derive_mac, derive_tap_name};
pub use tap::Tap;

/// Longest interface name the kernel accepts (IFNAMSIZ - 1)
pub const MAX_IFNAME_LEN: usize = 15;

/// Check that a name is usable as a kernel interface name
pub fn validate_ifname(name: &str) -> crate::error::Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IFNAME_LEN
        && name != "."
        && name != ".."
        && !name.chars().any(|c| c.is_whitespace() || c == '/' || c == ':');

    if valid {
        Ok(())
    } else {
        Err(crate::error::Error::InvalidName(name.to_string()))
    }
}
