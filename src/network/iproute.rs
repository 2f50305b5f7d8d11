//! The iproute2 command surface
//!
//! Every change to host networking goes through one of the invocations
//! built here. When elevated, the `ip` program and its arguments become
//! the arguments of the elevation wrapper (`sudo ip link ...`).

use crate::network::MacAddr;

/// Default iproute2 binary
pub const DEFAULT_IP_PROGRAM: &str = "ip";

/// Default privilege elevation wrapper
pub const DEFAULT_ELEVATION_PROGRAM: &str = "sudo";

/// A program and its arguments, ready for a [`crate::runner::CommandRunner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

/// Builds `ip` invocations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpCommand {
    ip_program: String,
    elevation_program: String,
}

impl Default for IpCommand {
    fn default() -> Self {
        Self::new(DEFAULT_IP_PROGRAM, DEFAULT_ELEVATION_PROGRAM)
    }
}

impl IpCommand {
    pub fn new(ip_program: impl Into<String>, elevation_program: impl Into<String>) -> Self {
        Self {
            ip_program: ip_program.into(),
            elevation_program: elevation_program.into(),
        }
    }

    fn build(&self, elevated: bool, args: &[&str]) -> Invocation {
        let args = args.iter().map(|a| a.to_string());
        if elevated {
            Invocation {
                program: self.elevation_program.clone(),
                args: std::iter::once(self.ip_program.clone()).chain(args).collect(),
            }
        } else {
            Invocation {
                program: self.ip_program.clone(),
                args: args.collect(),
            }
        }
    }

    /// `ip link show type tun`
    pub fn list_taps(&self, elevated: bool) -> Invocation {
        self.build(elevated, &["link", "show", "type", "tun"])
    }

    /// `ip link show type bridge`
    pub fn list_bridges(&self, elevated: bool) -> Invocation {
        self.build(elevated, &["link", "show", "type", "bridge"])
    }

    /// `ip link show master <bridge> type tun`
    pub fn list_taps_on_bridge(&self, elevated: bool, bridge: &str) -> Invocation {
        self.build(elevated, &["link", "show", "master", bridge, "type", "tun"])
    }

    /// `ip link add name <name> type bridge`
    pub fn create_bridge(&self, elevated: bool, name: &str) -> Invocation {
        self.build(elevated, &["link", "add", "name", name, "type", "bridge"])
    }

    /// `ip tuntap add dev <name> mode tap [user <owner>]`
    pub fn create_tap(&self, elevated: bool, name: &str, owner: Option<&str>) -> Invocation {
        match owner.filter(|o| !o.is_empty()) {
            Some(owner) => self.build(
                elevated,
                &["tuntap", "add", "dev", name, "mode", "tap", "user", owner],
            ),
            None => self.build(elevated, &["tuntap", "add", "dev", name, "mode", "tap"]),
        }
    }

    /// `ip link set dev <name> address <mac>`
    pub fn set_address(&self, elevated: bool, name: &str, mac: MacAddr) -> Invocation {
        let mac = mac.to_string();
        self.build(elevated, &["link", "set", "dev", name, "address", &mac])
    }

    /// `ip link set dev <name> up`
    pub fn set_up(&self, elevated: bool, name: &str) -> Invocation {
        self.build(elevated, &["link", "set", "dev", name, "up"])
    }

    /// `ip link set <name> master <bridge>`
    pub fn set_master(&self, elevated: bool, name: &str, bridge: &str) -> Invocation {
        self.build(elevated, &["link", "set", name, "master", bridge])
    }

    /// `ip tuntap del dev <name> mode tap`
    pub fn delete_tap(&self, elevated: bool, name: &str) -> Invocation {
        self.build(elevated, &["tuntap", "del", "dev", name, "mode", "tap"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::display_command;

    fn line(inv: Invocation) -> String {
        display_command(&inv.program, &inv.args)
    }

    #[test]
    fn test_listing_commands() {
        let ip = IpCommand::default();
        assert_eq!(line(ip.list_taps(false)), "ip link show type tun");
        assert_eq!(line(ip.list_bridges(false)), "ip link show type bridge");
        assert_eq!(
            line(ip.list_taps_on_bridge(false, "br0")),
            "ip link show master br0 type tun"
        );
    }

    #[test]
    fn test_mutating_commands() {
        let ip = IpCommand::default();
        assert_eq!(
            line(ip.create_bridge(false, "br0")),
            "ip link add name br0 type bridge"
        );
        assert_eq!(
            line(ip.create_tap(false, "tap0", Some("alice"))),
            "ip tuntap add dev tap0 mode tap user alice"
        );
        assert_eq!(
            line(ip.set_address(false, "tap0", "00:16:3e:01:02:03".parse().unwrap())),
            "ip link set dev tap0 address 00:16:3e:01:02:03"
        );
        assert_eq!(line(ip.set_up(false, "tap0")), "ip link set dev tap0 up");
        assert_eq!(
            line(ip.set_master(false, "tap0", "br0")),
            "ip link set tap0 master br0"
        );
        assert_eq!(
            line(ip.delete_tap(false, "tap0")),
            "ip tuntap del dev tap0 mode tap"
        );
    }

    #[test]
    fn test_create_tap_without_owner() {
        let ip = IpCommand::default();
        assert_eq!(
            line(ip.create_tap(false, "tap0", None)),
            "ip tuntap add dev tap0 mode tap"
        );
        assert_eq!(
            line(ip.create_tap(false, "tap0", Some(""))),
            "ip tuntap add dev tap0 mode tap"
        );
    }

    #[test]
    fn test_elevated_prefix() {
        let ip = IpCommand::default();
        let inv = ip.delete_tap(true, "tap0");
        assert_eq!(inv.program, "sudo");
        assert_eq!(inv.args[0], "ip");
        assert_eq!(line(inv), "sudo ip tuntap del dev tap0 mode tap");
    }

    #[test]
    fn test_custom_programs() {
        let ip = IpCommand::new("/sbin/ip", "doas");
        assert_eq!(line(ip.list_taps(false)), "/sbin/ip link show type tun");
        assert_eq!(line(ip.list_taps(true)), "doas /sbin/ip link show type tun");
    }
}
