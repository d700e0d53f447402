//! Command-line interface.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "quic-messenger")]
#[command(about = "Send messages over QUIC with a bounded listener", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Role to run; prompts on stdin when omitted.
    #[command(subcommand)]
    pub mode: Option<Mode>,
}

/// Peer role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Mode {
    /// Accept connections and print what peers send
    Server,
    /// Dial the server and send console lines
    Client,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "server" => Ok(Mode::Server),
            "client" => Ok(Mode::Client),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}
