//! CLI entry point.
//!
//! Parses arguments, sets up logging, and dispatches to a handler.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use narrate_cli::{Cli, Commands, handlers};

/// Log to stderr so progress output and piped data stay clean.
/// `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "narrate_cli=debug,narrate_speech=debug,narrate_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables (NARRATE_* defaults for flags)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Read(args) => handlers::read::execute(args).await?,
        Commands::Chunks(args) => handlers::chunks::execute(args).await?,
        Commands::Config { command } => handlers::config::execute(command)?,
        Commands::Paths => handlers::paths::execute()?,
    }

    Ok(())
}
