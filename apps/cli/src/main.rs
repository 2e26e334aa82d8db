//! dx-download-agent: download the files of a platform manifest
//!
//! Exit status is 0 when every file downloaded and verified, 1 when some
//! files failed, and 2 when nothing ran.

use clap::Parser;
use commands::{handle_download, handle_inspect, handle_whoami, Commands, EXIT_NOT_STARTED};
use std::process;

pub mod commands;

#[derive(Parser)]
#[command(name = "dx-download-agent", version, about, subcommand_required = true)]
struct Cli {
    /// Log at debug level and report every part
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    commands: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    let result = match cli.commands {
        Commands::Download(args) => handle_download(args, cli.verbose).await,
        Commands::Inspect { manifest } => handle_inspect(manifest).await,
        Commands::Whoami { api } => handle_whoami(api).await,
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(EXIT_NOT_STARTED);
        }
    }
}
