//! Bridge entity
//!
//! Provides:
//! - The bridge record tracked by the manager
//! - Ordered membership by tap name
//!
//! Membership is a back-reference. The taps themselves live in the
//! manager's tap index.

use crate::error::{Error, Result};
use crate::network::MacAddr;
use serde::Serialize;
use std::fmt;

/// A tracked bridge interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bridge {
    /// Bridge interface name (e.g., "br0")
    name: String,
    /// Bridge hardware address (unknown for bridges created before the next load)
    mac: Option<MacAddr>,
    /// Names of attached taps, in attach order
    members: Vec<String>,
}

impl Bridge {
    /// A bridge found on the host during reconciliation
    pub fn discovered(name: impl Into<String>, mac: MacAddr) -> Self {
        Self {
            name: name.into(),
            mac: Some(mac),
            members: Vec::new(),
        }
    }

    /// A bridge this process just created
    pub fn created(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mac: None,
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mac(&self) -> Option<MacAddr> {
        self.mac
    }

    /// Attached tap names
    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn has_member(&self, tap: &str) -> bool {
        self.members.iter().any(|m| m == tap)
    }

    /// Add a tap to the membership list
    pub(crate) fn add_member(&mut self, tap: &str) -> Result<()> {
        if self.has_member(tap) {
            return Err(Error::AlreadyAttached {
                tap: tap.to_string(),
                bridge: self.name.clone(),
            });
        }
        self.members.push(tap.to_string());
        Ok(())
    }

    /// Remove a tap from the membership list
    pub(crate) fn remove_member(&mut self, tap: &str) -> Result<()> {
        let pos = self
            .members
            .iter()
            .position(|m| m == tap)
            .ok_or_else(|| Error::NotAttached {
                tap: tap.to_string(),
                bridge: self.name.clone(),
            })?;
        self.members.remove(pos);
        Ok(())
    }
}

impl fmt::Display for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mac {
            Some(mac) => write!(f, "[{} {}]", self.name, mac)?,
            None => write!(f, "[{}]", self.name)?,
        }
        write!(f, " taps: {}", self.members.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_member_keeps_order() {
        let mut br = Bridge::created("br0");
        br.add_member("tap1").unwrap();
        br.add_member("tap0").unwrap();
        assert_eq!(br.members(), &["tap1".to_string(), "tap0".to_string()]);
    }

    #[test]
    fn test_add_member_twice_fails() {
        let mut br = Bridge::created("br0");
        br.add_member("tap0").unwrap();
        let err = br.add_member("tap0").unwrap_err();
        assert!(matches!(err, Error::AlreadyAttached { .. }));
        assert_eq!(br.members().len(), 1);
    }

    #[test]
    fn test_remove_member() {
        let mut br = Bridge::created("br0");
        br.add_member("tap0").unwrap();
        br.add_member("tap1").unwrap();
        br.remove_member("tap0").unwrap();
        assert!(!br.has_member("tap0"));
        assert!(br.has_member("tap1"));

        let err = br.remove_member("tap0").unwrap_err();
        assert!(matches!(err, Error::NotAttached { .. }));
    }

    #[test]
    fn test_display() {
        let mut br = Bridge::discovered("br0", "aa:bb:cc:dd:ee:ff".parse().unwrap());
        br.add_member("tap0").unwrap();
        assert_eq!(br.to_string(), "[br0 aa:bb:cc:dd:ee:ff] taps: tap0");
        assert_eq!(Bridge::created("br1").to_string(), "[br1] taps: ");
    }
}
