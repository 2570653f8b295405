use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "vschedctl",
    about = "vsched: dry-run the pool autoscaler",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what one autoscale cycle would do for a pool.
    ///
    /// The state file is JSON with the current pool size, the vpods and
    /// their placements, and the in-flight reservations:
    /// `{"replicas": 3, "vpods": [...], "reserved": {"ns/name": {"pod-0": 2}}}`.
    Plan {
        /// Pool settings (TOML)
        #[arg(short, long)]
        pool: String,
        /// Scheduler state (JSON)
        #[arg(short, long)]
        state: String,
        /// Plan a periodic cycle: compact the tail and allow shrinking
        #[arg(long)]
        scale_down: bool,
        /// Output format: json or text
        #[arg(short, long, default_value = "json")]
        format: String,
    },
    /// Validate a pool settings file
    Check {
        #[arg(short, long)]
        pool: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,vsched=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            pool,
            state,
            scale_down,
            format,
        } => commands::plan::plan(&pool, &state, scale_down, &format),
        Commands::Check { pool } => commands::check::check(&pool),
    }
}
