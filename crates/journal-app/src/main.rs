mod cli;
mod replay;
mod snapshot;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_DIRECTIVE: &str = "journal=info";

fn init_tracing(log_level: Option<&str>) {
    let directive = log_level.unwrap_or(DEFAULT_LOG_DIRECTIVE);
    let filter = EnvFilter::from_default_env();
    let filter = match directive.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(e) => {
            eprintln!("invalid log level {directive:?}: {e}");
            filter
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let args = cli::parse();

    // Initialize logging
    init_tracing(args.log_level.as_deref());

    tracing::info!("journal-replay v{} starting...", env!("CARGO_PKG_VERSION"));

    match replay::run(args).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Replay failed: {e}");
            ExitCode::FAILURE
        }
    }
}
