use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

mod commands;

/// mmm - Keep a Minecraft mods folder in sync with its mod list
#[derive(Parser)]
#[command(name = "mmm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the mod list
    #[arg(short, long, global = true, default_value = mmm::CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print the summary
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every mod in the mod list and lock it
    Install,

    /// Install, then move unpinned mods to their newest compatible release
    Update,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = mmm::logging::init(cli.verbose, cli.quiet) {
        eprintln!("Warning: could not set up logging: {}", e);
    }

    let cancel = CancellationToken::new();
    let interrupted = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted.cancel();
        }
    });

    let result = match cli.command {
        Commands::Install => commands::install::run(&cli.config, cli.quiet, cancel).await,
        Commands::Update => commands::update::run(&cli.config, cli.quiet, cancel).await,
    };

    match result {
        Ok(outcome) => std::process::exit(commands::exit_code(outcome)),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(commands::error_exit_code(&e));
        }
    }
}
