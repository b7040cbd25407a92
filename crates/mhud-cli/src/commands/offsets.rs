//! Offsets command implementation.

use std::path::Path;

use anyhow::Result;
use mhud::save_offsets;

use crate::attach;

/// Run the offsets command
pub fn run(process: &str, signatures: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let signatures = attach::signatures(signatures)?;
    let attached = attach::attach(process, &signatures)?;
    let module = attached.module;

    println!("Module: {}", process);
    println!("  Base:  0x{:X}", module.base);
    println!("  Size:  0x{:X}", module.size);
    println!("  Image: {:?}", module.kind);
    println!();
    println!("Signatures: {}", signatures.version);
    println!("  PlayerManager slot:  0x{:X}", attached.offsets.manager_slot);
    println!(
        "  Player list offset:  0x{:X}",
        attached.offsets.player_list_offset
    );

    if let Some(path) = output {
        save_offsets(path, &attached.offsets)?;
        println!();
        println!("Saved offsets to {}", path.display());
    }

    Ok(())
}
