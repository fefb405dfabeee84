mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cli::ConfigCommands;

#[derive(Parser)]
#[command(name = "traypet")]
#[command(about = "Tray pet whose mood follows battery, temperature, Wi-Fi and volume")]
#[command(version)]
struct Cli {
    /// Directory holding config.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pet until interrupted
    Run {
        /// Don't log renders or read commands from stdin
        #[arg(long)]
        headless: bool,
        /// Stop after this many seconds
        #[arg(long = "for", value_name = "SECS")]
        for_secs: Option<u64>,
        /// Replay telemetry from a JSON array of snapshots instead of reading the host
        #[arg(long)]
        snapshots: Option<PathBuf>,
    },
    /// Sample the system once and print the candidate expressions
    Status,
    /// Print today's fortune for the configured birthday
    Fortune {
        /// Date to read the fortune for (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,
    },
    /// Inspect or edit the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "traypet=debug" } else { "traypet=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            headless,
            for_secs,
            snapshots,
        } => cli::handle_run(cli.data_dir, headless, for_secs, snapshots).await,
        Commands::Status => cli::handle_status(cli.data_dir).await,
        Commands::Fortune { today } => cli::handle_fortune(cli.data_dir, today).await,
        Commands::Config { command } => cli::handle_config(cli.data_dir, command).await,
    }
}
