use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod attach;
mod commands;
mod shutdown;

#[derive(Parser)]
#[command(name = "mhud")]
#[command(about = "MissingHUD diagnostics for a running Isaac: Rebirth", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Locate the game module and resolve the PlayerManager offsets
    Offsets {
        #[arg(short, long, default_value = "isaac-ng.exe")]
        process: String,

        /// Signature set JSON (compiled-in set when omitted)
        #[arg(short, long)]
        signatures: Option<PathBuf>,

        /// Save the resolved offsets as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print player stats and the deal chance as they change
    Watch {
        #[arg(short, long, default_value = "isaac-ng.exe")]
        process: String,

        #[arg(short, long, default_value_t = 250)]
        interval_ms: u64,

        /// Memory layout JSON (compiled-in layout when omitted)
        #[arg(short, long)]
        layout: Option<PathBuf>,

        #[arg(short, long)]
        signatures: Option<PathBuf>,

        /// How long a change stays highlighted
        #[arg(long, default_value_t = 2500)]
        window_ms: u64,
    },

    /// Write the compiled-in layout and signatures as JSON
    Defaults {
        #[arg(short, long, default_value = "layout.json")]
        layout: PathBuf,

        #[arg(short, long, default_value = "signatures.json")]
        signatures: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mhud=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Offsets {
            process,
            signatures,
            output,
        } => commands::offsets::run(&process, signatures.as_deref(), output.as_deref()),
        Command::Watch {
            process,
            interval_ms,
            layout,
            signatures,
            window_ms,
        } => commands::watch::run(commands::watch::WatchOptions {
            process,
            interval_ms,
            layout,
            signatures,
            window_ms,
        }),
        Command::Defaults { layout, signatures } => commands::defaults::run(&layout, &signatures),
    }
}
