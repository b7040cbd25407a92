//! Watch command implementation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use mhud::{
    GameLayout, GameReader, HudSnapshot, PointerChainResolver, ReadMemory, StatReading, load_layout,
};
use owo_colors::OwoColorize;
use tracing::{info, warn};

use crate::attach;
use crate::shutdown::ShutdownSignal;

pub struct WatchOptions {
    pub process: String,
    pub interval_ms: u64,
    pub layout: Option<PathBuf>,
    pub signatures: Option<PathBuf>,
    pub window_ms: u64,
}

/// Run the watch command
pub fn run(options: WatchOptions) -> Result<()> {
    let shutdown = ShutdownSignal::on_ctrlc()?;

    let layout = match &options.layout {
        Some(path) => load_layout(path)
            .with_context(|| format!("Failed to load layout from {}", path.display()))?,
        None => GameLayout::default(),
    };
    let signatures = attach::signatures(options.signatures.as_deref())?;
    let attached = attach::attach(&options.process, &signatures)?;
    info!(
        "Attached, PlayerManager slot at {:#x}",
        attached.offsets.manager_slot
    );

    let module_base = attached.module.base;
    let resolver = PointerChainResolver::new(attached.reader, attached.offsets, layout);
    let mut game = GameReader::new(resolver, Duration::from_millis(options.window_ms));
    let interval = Duration::from_millis(options.interval_ms.max(1));

    println!("Watching {} (Ctrl+C to quit)", options.process);
    let mut last_printed: Option<Vec<String>> = None;

    while !shutdown.is_shutdown() {
        let snapshot = game.snapshot();
        let lines = snapshot.lines();

        if last_printed.as_ref() != Some(&lines) {
            print_snapshot(&snapshot);
            last_printed = Some(lines);
        }

        // Header reads fail once the process is gone
        if game.resolver().reader().read_bytes(module_base, 2).is_err() {
            warn!("Game process exited");
            break;
        }

        shutdown.wait(interval);
    }

    Ok(())
}

fn print_snapshot(snapshot: &HudSnapshot) {
    let stamp = Local::now().format("%H:%M:%S");
    if !snapshot.run_active {
        println!("[{}] {}", stamp, "no run in progress".dimmed());
        return;
    }

    println!("[{}]", stamp);
    for reading in &snapshot.readings {
        println!("  {}", render_reading(reading));
    }
}

/// HUD line with the recent change colored by whether it helps the player.
pub fn render_reading(reading: &StatReading) -> String {
    let base = format!("{:<12} {}", format!("{}:", reading.stat), reading.value_text());
    match reading.delta_text() {
        Some(delta) if reading.is_improvement() => format!("{} {}", base, delta.green()),
        Some(delta) => format!("{} {}", base, delta.red()),
        None => base,
    }
}
