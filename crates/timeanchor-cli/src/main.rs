use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "timeanchor", version, about = "Anchor flexible tasks into the gaps of your day")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Anchor tasks into a day's calendar gaps
    Anchor(commands::anchor::AnchorArgs),
    /// Show the available slots for a day
    Gaps(commands::gaps::GapsArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// Log to stderr, filtered by TIMEANCHOR_LOG, then RUST_LOG, default warn.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("TIMEANCHOR_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Anchor(args) => commands::anchor::run(args),
        Commands::Gaps(args) => commands::gaps::run(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
