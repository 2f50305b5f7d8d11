//! Configuration file parsing for tapfleet
//!
//! Parses `tapfleet.toml` configuration files using serde

use crate::error::{Error, Result};
use crate::manager::ManagerOptions;
use crate::network::iproute::{DEFAULT_ELEVATION_PROGRAM, DEFAULT_IP_PROGRAM};
use crate::network::{IpCommand, validate_ifname};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "tapfleet.toml";

/// Load configuration from a file
pub fn load(path: &Path) -> Result<TapfleetConfig> {
    let content = fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: TapfleetConfig = toml::from_str(&content)?;
    config.validate()?;

    Ok(config)
}

/// Load a file if given, else the default file if present, else defaults
pub fn load_or_default(path: Option<&Path>) -> Result<TapfleetConfig> {
    match path {
        Some(path) => load(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                load(default)
            } else {
                Ok(TapfleetConfig::default())
            }
        }
    }
}

/// Root configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct TapfleetConfig {
    /// Global configuration settings
    #[serde(default)]
    pub config: GlobalConfig,
}

impl TapfleetConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let c = &self.config;

        if c.ip_program.trim().is_empty() {
            return Err(Error::ConfigValidation("ip_program must not be empty".into()));
        }
        if c.elevation_program.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "elevation_program must not be empty".into(),
            ));
        }
        if let Some(owner) = &c.owner {
            if owner.trim().is_empty() {
                return Err(Error::ConfigValidation("owner must not be empty".into()));
            }
        }
        if let Some(bridge) = &c.default_bridge {
            validate_ifname(bridge).map_err(|_| {
                Error::ConfigValidation(format!("Invalid default_bridge '{}'", bridge))
            })?;
        }

        Ok(())
    }

    /// Manager options for this configuration, with a resolved owner
    pub fn manager_options(&self, owner: Option<String>) -> ManagerOptions {
        let c = &self.config;
        ManagerOptions {
            owner,
            elevated: c.elevated,
            force_mac: c.force_mac,
            ip: IpCommand::new(&c.ip_program, &c.elevation_program),
        }
    }
}

/// Global configuration settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Identity that owns created taps (falls back to the invoking user)
    pub owner: Option<String>,

    /// Prefix `ip` commands with the elevation program
    pub elevated: bool,

    /// Privilege elevation wrapper
    pub elevation_program: String,

    /// iproute2 binary
    pub ip_program: String,

    /// Set the derived MAC on new taps instead of keeping the kernel's
    pub force_mac: bool,

    /// Per-command timeout in seconds (0 = wait forever)
    pub command_timeout: u64,

    /// Bridge used when a command needs one and none is given
    pub default_bridge: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            owner: None,
            elevated: true,
            elevation_program: DEFAULT_ELEVATION_PROGRAM.to_string(),
            ip_program: DEFAULT_IP_PROGRAM.to_string(),
            force_mac: false,
            command_timeout: default_command_timeout(),
            default_bridge: Some("br0".to_string()),
        }
    }
}

impl GlobalConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }
}

fn default_command_timeout() -> u64 {
    30
}
