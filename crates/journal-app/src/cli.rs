use std::path::PathBuf;

use clap::Parser;

/// Replay backend push events against the journal client state.
///
/// Reads newline-delimited `{"channel": ..., "payload": ...}` messages from
/// stdin and publishes each one as if the backend had pushed it.
#[derive(Parser, Debug)]
#[command(name = "journal-replay", version, about)]
pub struct Args {
    /// JSON snapshot (`{ready, users, instances}`) served as the backend.
    #[arg(short = 'd', long)]
    pub data: Option<PathBuf>,

    /// Preference file path override.
    #[arg(long, conflicts_with = "memory_prefs")]
    pub prefs: Option<PathBuf>,

    /// Keep preferences in memory only.
    #[arg(long)]
    pub memory_prefs: bool,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
