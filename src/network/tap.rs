//! Tap interface entity
//!
//! A tap is the host side of a VM's network adapter. The manager tracks
//! whether it created the tap (`owned`) and which bridge it is attached to.

use crate::network::MacAddr;
use serde::Serialize;
use std::fmt;

/// A tracked tap interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tap {
    /// Kernel interface name (e.g., "tap0")
    name: String,
    /// Hardware address
    mac: MacAddr,
    /// Name of the bridge this tap is attached to
    bridge: Option<String>,
    /// True only if this process created the interface
    owned: bool,
}

impl Tap {
    /// A tap found on the host during reconciliation
    pub fn discovered(name: impl Into<String>, mac: MacAddr) -> Self {
        Self {
            name: name.into(),
            mac,
            bridge: None,
            owned: false,
        }
    }

    /// A tap this process just created
    pub fn created(name: impl Into<String>, mac: MacAddr) -> Self {
        Self {
            owned: true,
            ..Self::discovered(name, mac)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    /// Bridge this tap is attached to, if any
    pub fn bridge(&self) -> Option<&str> {
        self.bridge.as_deref()
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub(crate) fn set_bridge(&mut self, bridge: Option<String>) {
        self.bridge = bridge;
    }

    #[cfg(test)]
    pub(crate) fn set_owned(&mut self, owned: bool) {
        self.owned = owned;
    }
}

impl fmt::Display for Tap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.name, self.mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::derive_mac;

    #[test]
    fn test_discovered_is_not_owned() {
        let tap = Tap::discovered("tap0", derive_mac("tap0"));
        assert!(!tap.is_owned());
        assert_eq!(tap.bridge(), None);
    }

    #[test]
    fn test_created_is_owned() {
        let tap = Tap::created("tap0", derive_mac("tap0"));
        assert!(tap.is_owned());
        assert_eq!(tap.name(), "tap0");
    }

    #[test]
    fn test_display() {
        let tap = Tap::discovered("tap0", "12:34:56:67:89:ab".parse().unwrap());
        assert_eq!(tap.to_string(), "[tap0 12:34:56:67:89:ab]");
    }
}
