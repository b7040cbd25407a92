//! Defaults command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use mhud::{GameLayout, builtin_signatures, save_layout, save_signatures};

/// Write the compiled-in layout and signatures, the starting point for an
/// override after a game patch.
pub fn run(layout_path: &Path, signatures_path: &Path) -> Result<()> {
    let layout = GameLayout::default();
    save_layout(layout_path, &layout)
        .with_context(|| format!("Failed to write {}", layout_path.display()))?;
    println!("Wrote layout {} to {}", layout.version, layout_path.display());

    let signatures = builtin_signatures();
    save_signatures(signatures_path, &signatures)
        .with_context(|| format!("Failed to write {}", signatures_path.display()))?;
    println!(
        "Wrote signatures {} to {}",
        signatures.version,
        signatures_path.display()
    );

    Ok(())
}
