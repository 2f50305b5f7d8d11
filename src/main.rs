//! tapfleet - tap and bridge manager for VM host networking
//!
//! Command-line front end over the tapfleet library: loads configuration,
//! sets up logging, and drives a [`Manager`] over the host's `ip` tool.

mod cli;

use cli::{Cli, Commands};
use std::io;
use tapfleet::manifest::{self, TapfleetConfig};
use tapfleet::{Error, MacAddr, Manager, Result, SystemRunner, derive_mac, derive_tap_name};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Install the tracing subscriber; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Owner identity: config, then $USER, then the passwd entry of our uid
fn resolve_owner(config: &TapfleetConfig) -> Option<String> {
    config
        .config
        .owner
        .clone()
        .or_else(|| std::env::var("USER").ok().filter(|u| !u.is_empty()))
        .or_else(|| {
            nix::unistd::User::from_uid(nix::unistd::getuid())
                .ok()
                .flatten()
                .map(|u| u.name)
        })
}

fn build_manager(cli: &Cli, config: &TapfleetConfig) -> Manager<SystemRunner> {
    let runner = SystemRunner::new().with_timeout(config.config.command_timeout());
    let mut options = config.manager_options(resolve_owner(config));
    if cli.no_elevate {
        options.elevated = false;
    }
    Manager::with_options(runner, options)
}

/// Block until the reader reaches EOF, discarding whatever it yields
fn wait_for_eof<R: io::Read>(mut reader: R) -> io::Result<u64> {
    io::copy(&mut reader, &mut io::sink())
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    // Commands that don't touch the host
    match &cli.command {
        Commands::Completion { shell } => {
            Cli::generate_completion(*shell);
            return Ok(());
        }
        Commands::Mac { seed, random } => {
            let mac = match seed {
                Some(seed) if !*random => derive_mac(seed),
                _ => MacAddr::random(),
            };
            println!("{}", mac);
            return Ok(());
        }
        _ => {}
    }

    let config = manifest::load_or_default(cli.config.as_deref())?;
    let manager = build_manager(&cli, &config);

    match &cli.command {
        Commands::Status { json } => {
            manager.load()?;
            let snapshot = manager.snapshot();

            if *json {
                let out = serde_json::to_string_pretty(&snapshot)
                    .map_err(|e| Error::Io(e.into()))?;
                println!("{}", out);
                return Ok(());
            }

            if snapshot.bridges.is_empty() {
                println!("No bridges");
            }
            for bridge in &snapshot.bridges {
                let mac = bridge.mac().map(|m| m.to_string()).unwrap_or_default();
                println!("{:<16} {:<18} {}", bridge.name(), mac, bridge.members().join(" "));
            }
            println!();
            for tap in &snapshot.taps {
                println!(
                    "{:<16} {:<18} {}",
                    tap.name(),
                    tap.mac().to_string(),
                    tap.bridge().unwrap_or("-")
                );
            }
        }

        Commands::CreateBridge { name } => {
            manager.load()?;
            manager.create_bridge(name)?;
            println!("Created bridge {}", name);
        }

        Commands::CreateTap { name, bridge } => {
            manager.load()?;
            let mac = manager.create_tap(name)?;
            if let Some(bridge) = bridge {
                manager.add_tap_to_bridge(name, bridge)?;
            }
            println!("{} {}", name, mac);
        }

        Commands::Attach { tap, bridge } => {
            manager.load()?;
            manager.add_tap_to_bridge(tap, bridge)?;
            println!("Attached {} to {}", tap, bridge);
        }

        Commands::Hold { tap, seed, bridge } => {
            let name = match (tap, seed) {
                (Some(tap), _) => tap.clone(),
                (None, Some(seed)) => {
                    let owner = manager.owner().ok_or(Error::MissingOwner)?;
                    derive_tap_name(&format!("{}{}", seed, owner))
                }
                (None, None) => return Err(Error::InvalidName(String::new())),
            };
            let bridge = bridge.clone().or_else(|| config.config.default_bridge.clone());

            manager.load()?;
            let mac = manager.create_tap(&name)?;

            if let Some(bridge) = &bridge {
                manager.attach_or_release(&name, bridge)?;
            }

            println!("{} {}", name, mac);
            info!(tap = %name, "holding tap until stdin closes");

            let waited = wait_for_eof(io::stdin());

            let deleted = manager.delete_taps()?;
            waited?;
            info!(count = deleted.len(), "released taps");
        }

        Commands::Completion { .. } | Commands::Mac { .. } => {}
    }

    Ok(())
}
