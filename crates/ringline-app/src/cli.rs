use std::path::PathBuf;

use clap::Parser;

/// ringline: a terminal softphone for relay-signaled voice calls.
#[derive(Parser, Debug)]
#[command(name = "ringline", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Relay WebSocket URL (overrides `client.relay_url`).
    #[arg(long)]
    pub relay: Option<String>,

    /// Identity to register as (overrides `client.identity`).
    #[arg(short, long)]
    pub identity: Option<String>,

    /// Name shown to the people you call.
    #[arg(short = 'n', long)]
    pub display_name: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
