//! Command-line argument parsing for the Tread client.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Tread client command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "tread", about = "Headless Tread game client")]
pub struct CliArgs {
    /// Socket URL, e.g. ws://127.0.0.1:8080 (overrides origin derivation).
    #[arg(long)]
    pub server_url: Option<String>,

    /// Page origin the socket URL is derived from.
    #[arg(long)]
    pub origin: Option<String>,

    /// Development server port.
    #[arg(long)]
    pub dev_port: Option<u16>,

    /// Display name sent when joining.
    #[arg(long)]
    pub name: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Drive the tank with a scripted input pattern.
    #[arg(long)]
    pub autopilot: bool,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref url) = args.server_url {
            self.network.server_url = Some(url.clone());
        }
        if let Some(ref origin) = args.origin {
            self.network.page_origin = origin.clone();
        }
        if let Some(port) = args.dev_port {
            self.network.dev_port = Some(port);
        }
        if let Some(ref name) = args.name {
            self.player.display_name = name.clone();
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
