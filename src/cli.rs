//! Command-line interface for tapfleet
//!
//! Uses clap with derive for type-safe CLI parsing

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// tapfleet - tap and bridge manager for VM host networking
#[derive(Parser)]
#[command(name = "tapfleet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path (default: ./tapfleet.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run ip directly instead of through the elevation program
    #[arg(long)]
    pub no_elevate: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show bridges and taps found on the host
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Create a bridge and bring it up
    CreateBridge {
        /// Bridge name
        name: String,
    },

    /// Create a tap and bring it up (it is left in place on exit)
    CreateTap {
        /// Tap name
        name: String,

        /// Attach the tap to this bridge
        #[arg(short, long)]
        bridge: Option<String>,
    },

    /// Attach an existing tap to a bridge
    Attach {
        /// Tap name
        tap: String,

        /// Bridge name
        bridge: String,
    },

    /// Create a tap, attach it, and delete it again once stdin closes
    Hold {
        /// Tap name
        #[arg(short, long, conflicts_with = "seed", required_unless_present = "seed")]
        tap: Option<String>,

        /// Derive the tap name from this seed (e.g. a disk image path)
        #[arg(short, long)]
        seed: Option<String>,

        /// Bridge to attach to (defaults to the configured default bridge)
        #[arg(short, long)]
        bridge: Option<String>,
    },

    /// Print a MAC address derived from a seed
    Mac {
        /// Seed string
        #[arg(required_unless_present = "random")]
        seed: Option<String>,

        /// Print a random locally administered address instead
        #[arg(long, conflicts_with = "seed")]
        random: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Generate shell completion scripts
    pub fn generate_completion(shell: Shell) {
        let mut cmd = Self::command();
        clap_complete::generate(shell, &mut cmd, "tapfleet", &mut std::io::stdout());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create_tap_with_bridge() {
        let cli = Cli::try_parse_from(["tapfleet", "-v", "create-tap", "tap0", "-b", "br0"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::CreateTap { name, bridge } => {
                assert_eq!(name, "tap0");
                assert_eq!(bridge.as_deref(), Some("br0"));
            }
            _ => panic!("expected create-tap"),
        }
    }

    #[test]
    fn test_hold_tap_and_seed_conflict() {
        assert!(Cli::try_parse_from(["tapfleet", "hold", "--tap", "t", "--seed", "s"]).is_err());
    }

    #[test]
    fn test_hold_requires_tap_or_seed() {
        assert!(Cli::try_parse_from(["tapfleet", "hold"]).is_err());
        assert!(Cli::try_parse_from(["tapfleet", "hold", "--seed", "disk.qcow2"]).is_ok());
    }

    #[test]
    fn test_mac_requires_seed_or_random() {
        assert!(Cli::try_parse_from(["tapfleet", "mac"]).is_err());
        assert!(Cli::try_parse_from(["tapfleet", "mac", "--random"]).is_ok());
        assert!(Cli::try_parse_from(["tapfleet", "mac", "seed"]).is_ok());
    }
}
