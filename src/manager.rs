//! Manager for the host's tap and bridge fleet
//!
//! Handles:
//! - Reconciling tracked state with the live `ip link` listings
//! - Creating taps and bridges and attaching taps to bridges
//! - Tearing down the taps this process created, and only those
//!
//! One lock guards all state and is held for the whole of every operation,
//! external commands included, so callers never observe a half-applied
//! change and commands from concurrent callers never interleave.

use crate::error::{Error, Result, ResultExt};
use crate::network::iproute::Invocation;
use crate::network::parse::{parse_bridges, parse_taps};
use crate::network::{Bridge, IpCommand, MacAddr, Tap, derive_mac, validate_ifname};
use crate::runner::{CommandOutput, CommandRunner, SystemRunner, display_command};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Settings fixed for the lifetime of a manager
#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    /// Identity that owns created taps and seeds their MAC addresses
    pub owner: Option<String>,
    /// Start with the elevation wrapper enabled
    pub elevated: bool,
    /// Also set the derived MAC on newly created taps
    pub force_mac: bool,
    /// Programs used to build commands
    pub ip: IpCommand,
}

impl ManagerOptions {
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    pub fn force_mac(mut self, force_mac: bool) -> Self {
        self.force_mac = force_mac;
        self
    }

    pub fn with_ip(mut self, ip: IpCommand) -> Self {
        self.ip = ip;
        self
    }
}

/// Lock-protected state
#[derive(Debug, Default)]
struct State {
    taps: BTreeMap<String, Tap>,
    bridges: BTreeMap<String, Bridge>,
    elevated: bool,
}

/// Point-in-time copy of the tracked fleet
#[derive(Debug, Clone, Serialize)]
pub struct FleetSnapshot {
    pub elevated: bool,
    pub bridges: Vec<Bridge>,
    pub taps: Vec<Tap>,
}

/// Tracks and drives the host's taps and bridges
pub struct Manager<R: CommandRunner = SystemRunner> {
    state: Mutex<State>,
    runner: R,
    ip: IpCommand,
    owner: Option<String>,
    force_mac: bool,
}

impl Manager<SystemRunner> {
    /// Manager that runs commands on this host
    pub fn system(options: ManagerOptions) -> Self {
        Self::with_options(SystemRunner::new(), options)
    }
}

impl<R: CommandRunner> Manager<R> {
    /// Create a manager with default options and no owner identity
    pub fn new(runner: R) -> Self {
        Self::with_options(runner, ManagerOptions::default())
    }

    pub fn with_options(runner: R, options: ManagerOptions) -> Self {
        Self {
            state: Mutex::new(State {
                elevated: options.elevated,
                ..State::default()
            }),
            runner,
            ip: options.ip,
            owner: options.owner,
            force_mac: options.force_mac,
        }
    }

    /// The command runner this manager drives
    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // State is only written after the commands it reflects succeeded
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn exec(&self, invocation: Invocation) -> Result<CommandOutput> {
        debug!(
            command = %display_command(&invocation.program, &invocation.args),
            "issuing command"
        );
        self.runner.run(&invocation.program, &invocation.args)
    }

    /// Toggle the privilege elevation wrapper for subsequent commands
    pub fn set_elevated(&self, elevated: bool) {
        self.lock().elevated = elevated;
    }

    pub fn is_elevated(&self) -> bool {
        self.lock().elevated
    }

    /// Rebuild tracked state from the host's interface listings
    ///
    /// Everything found is recorded as discovered (not owned). Previously
    /// tracked state is dropped, including ownership of taps created
    /// earlier. If any listing fails the manager is left empty.
    pub fn load(&self) -> Result<()> {
        let mut state = self.lock();
        state.taps.clear();
        state.bridges.clear();
        let elevated = state.elevated;

        let out = self
            .exec(self.ip.list_taps(elevated))
            .context("listing taps")?;
        let mut taps: BTreeMap<String, Tap> = parse_taps(&out.text())
            .into_iter()
            .map(|tap| (tap.name().to_string(), tap))
            .collect();

        let out = self
            .exec(self.ip.list_bridges(elevated))
            .context("listing bridges")?;

        let mut bridges = BTreeMap::new();
        for mut bridge in parse_bridges(&out.text()) {
            let out = self
                .exec(self.ip.list_taps_on_bridge(elevated, bridge.name()))
                .with_context(|| format!("listing taps on bridge {}", bridge.name()))?;

            for member in parse_taps(&out.text()) {
                let inconsistent = || Error::Inconsistent {
                    bridge: bridge.name().to_string(),
                    tap: member.name().to_string(),
                };

                let tap = taps.get_mut(member.name()).ok_or_else(inconsistent)?;
                match tap.bridge() {
                    None => {}
                    Some(b) if b == bridge.name() => continue,
                    Some(_) => return Err(inconsistent()),
                }

                bridge.add_member(member.name())?;
                tap.set_bridge(Some(bridge.name().to_string()));
            }

            bridges.insert(bridge.name().to_string(), bridge);
        }

        info!(taps = taps.len(), bridges = bridges.len(), "loaded host state");
        state.taps = taps;
        state.bridges = bridges;
        Ok(())
    }

    /// Create a tap owned by this process and bring it up
    ///
    /// The MAC is derived from the owner identity and the tap name. Returns
    /// the MAC recorded for the new tap.
    pub fn create_tap(&self, name: &str) -> Result<MacAddr> {
        validate_ifname(name)?;

        let mut state = self.lock();
        if state.taps.contains_key(name) {
            return Err(Error::TapAlreadyExists(name.to_string()));
        }

        let owner = self
            .owner
            .as_deref()
            .filter(|o| !o.is_empty())
            .ok_or(Error::MissingOwner)?;
        let mac = derive_mac(&format!("{}{}", owner, name));
        let elevated = state.elevated;

        let created = self
            .exec(self.ip.create_tap(elevated, name, Some(owner)))
            .context("creating tap interface")
            .and_then(|_| self.configure_tap(elevated, name, mac));

        if let Err(e) = created {
            // Best effort: the creation failure is what gets reported
            if let Err(cleanup) = self.exec(self.ip.delete_tap(elevated, name)) {
                debug!(tap = %name, error = %cleanup, "cleanup of failed tap did not succeed");
            }
            return Err(e.context(format!("creating tap {}", name)));
        }

        state.taps.insert(name.to_string(), Tap::created(name, mac));
        info!(tap = %name, mac = %mac, "created tap");
        Ok(mac)
    }

    fn configure_tap(&self, elevated: bool, name: &str, mac: MacAddr) -> Result<()> {
        if self.force_mac {
            self.exec(self.ip.set_address(elevated, name, mac))
                .context("setting mac address on tap interface")?;
        }
        self.exec(self.ip.set_up(elevated, name))
            .context("setting link state up on tap interface")?;
        Ok(())
    }

    /// Create a bridge and bring it up
    pub fn create_bridge(&self, name: &str) -> Result<()> {
        validate_ifname(name)?;

        let mut state = self.lock();
        if state.bridges.contains_key(name) {
            return Err(Error::BridgeAlreadyExists(name.to_string()));
        }
        let elevated = state.elevated;

        self.exec(self.ip.create_bridge(elevated, name))
            .context("creating bridge")
            .and_then(|_| {
                self.exec(self.ip.set_up(elevated, name))
                    .context("setting link state up on bridge")
            })
            .with_context(|| format!("creating bridge {}", name))?;

        state.bridges.insert(name.to_string(), Bridge::created(name));
        info!(bridge = %name, "created bridge");
        Ok(())
    }

    /// Attach a tracked tap to a tracked bridge
    ///
    /// State changes only after `ip` accepted the change. An owned tap
    /// attached elsewhere moves to the new bridge. A discovered tap is
    /// never pulled off a bridge it is already on.
    pub fn add_tap_to_bridge(&self, tap: &str, bridge: &str) -> Result<()> {
        let mut guard = self.lock();
        let State {
            taps,
            bridges,
            elevated,
        } = &mut *guard;

        let entry = taps
            .get_mut(tap)
            .ok_or_else(|| Error::TapNotFound(tap.to_string()))?;
        let target = bridges
            .get(bridge)
            .ok_or_else(|| Error::BridgeNotFound(bridge.to_string()))?;

        if target.has_member(tap) {
            return Err(Error::AlreadyAttached {
                tap: tap.to_string(),
                bridge: bridge.to_string(),
            });
        }
        let previous = entry.bridge().map(str::to_string);
        if previous.is_some() && !entry.is_owned() {
            return Err(Error::NotOwned(tap.to_string()));
        }

        self.exec(self.ip.set_master(*elevated, tap, bridge))
            .context("adding tap to bridge")
            .with_context(|| format!("attaching {} to {}", tap, bridge))?;

        if let Some(prev) = previous.as_deref().and_then(|p| bridges.get_mut(p)) {
            prev.remove_member(tap)?;
        }
        if let Some(target) = bridges.get_mut(bridge) {
            target.add_member(tap)?;
        }
        entry.set_bridge(Some(bridge.to_string()));

        info!(tap = %tap, bridge = %bridge, "attached tap to bridge");
        Ok(())
    }

    /// Attach a freshly created tap, releasing owned taps if that fails
    ///
    /// The attach error is returned even when the release also fails.
    pub fn attach_or_release(&self, tap: &str, bridge: &str) -> Result<()> {
        let Err(e) = self.add_tap_to_bridge(tap, bridge) else {
            return Ok(());
        };
        if let Err(cleanup) = self.delete_taps() {
            warn!(tap = %tap, error = %cleanup, "releasing unattached tap did not succeed");
        }
        Err(e)
    }

    /// Delete every tap this process created
    ///
    /// Discovered taps are never touched and stay attached. Stops at the
    /// first failed deletion; taps already deleted are forgotten, the rest
    /// stay tracked. Returns the names deleted.
    pub fn delete_taps(&self) -> Result<Vec<String>> {
        let mut guard = self.lock();
        let State {
            taps,
            bridges,
            elevated,
        } = &mut *guard;

        let owned: Vec<String> = taps
            .values()
            .filter(|t| t.is_owned())
            .map(|t| t.name().to_string())
            .collect();

        let mut deleted = Vec::with_capacity(owned.len());
        for name in owned {
            self.exec(self.ip.delete_tap(*elevated, &name))
                .context("deleting tap interface")
                .with_context(|| format!("deleting tap {}", name))?;

            if let Some(tap) = taps.remove(&name) {
                if let Some(bridge) = tap.bridge().and_then(|b| bridges.get_mut(b)) {
                    bridge.remove_member(&name)?;
                }
            }
            info!(tap = %name, "deleted tap");
            deleted.push(name);
        }

        Ok(deleted)
    }

    pub fn has_tap(&self, tap: &str) -> bool {
        self.lock().taps.contains_key(tap)
    }

    pub fn has_bridge(&self, bridge: &str) -> bool {
        self.lock().bridges.contains_key(bridge)
    }

    pub fn bridge_has_tap(&self, bridge: &str, tap: &str) -> bool {
        self.lock()
            .bridges
            .get(bridge)
            .is_some_and(|b| b.has_member(tap))
    }

    /// MAC recorded for a tracked tap
    pub fn get_mac(&self, tap: &str) -> Result<MacAddr> {
        self.lock()
            .taps
            .get(tap)
            .map(Tap::mac)
            .ok_or_else(|| Error::TapNotFound(tap.to_string()))
    }

    /// Copy of the tracked fleet, bridges and taps in name order
    pub fn snapshot(&self) -> FleetSnapshot {
        let state = self.lock();
        FleetSnapshot {
            elevated: state.elevated,
            bridges: state.bridges.values().cloned().collect(),
            taps: state.taps.values().cloned().collect(),
        }
    }

    #[cfg(test)]
    fn mark_owned(&self, tap: &str) {
        if let Some(t) = self.lock().taps.get_mut(tap) {
            t.set_owned(true);
        }
    }
}

impl<R: CommandRunner> fmt::Display for Manager<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        for bridge in state.bridges.values() {
            writeln!(f, "{}", bridge)?;
        }
        Ok(())
    }
}
