use clap::{Parser, Subcommand};
use intervalkit_core::TimerKind;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod session;
mod terminal;

#[derive(Parser)]
#[command(name = "intervalkit", version, about = "intervalkit CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        /// Timer kind: countdown, analog, stopwatch, cycle, dual-clock, multi
        kind: TimerKind,
        /// Store key (defaults to the kind's own page)
        #[arg(long)]
        key: Option<String>,
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Follow a running timer until it stops
    Watch(commands::watch::WatchArgs),
    /// Pinned mini-timer list
    Pin {
        #[command(subcommand)]
        action: commands::pin::PinAction,
    },
    /// Drive pinned timers
    Board {
        #[command(subcommand)]
        action: commands::board::BoardAction,
    },
    /// Usage statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("INTERVALKIT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer { kind, key, action } => commands::timer::run(kind, key, action),
        Commands::Watch(args) => commands::watch::run(args),
        Commands::Pin { action } => commands::pin::run(action),
        Commands::Board { action } => commands::board::run(action),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
