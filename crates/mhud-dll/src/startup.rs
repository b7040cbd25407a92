//! Inputs gathered before the lifecycle starts.

use std::path::Path;

use mhud::{
    CONFIG_FILE_NAME, GameLayout, HudConfig, SignatureSet, builtin_signatures, load_layout,
    load_signatures,
};
use tracing::{info, warn};

/// Read `MHUD2.toml` from `dir`. Missing or broken files fall back to
/// defaults so the overlay still comes up.
pub fn load_config(dir: Option<&Path>) -> HudConfig {
    let Some(dir) = dir else {
        warn!("Library directory unknown, using default config");
        return HudConfig::default();
    };

    let path = dir.join(CONFIG_FILE_NAME);
    match HudConfig::load(&path) {
        Ok(config) => {
            info!("Loaded config from {:?}", path);
            config.resolve_paths(dir)
        }
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            HudConfig::default()
        }
    }
}

/// Memory layout and signatures, with any configured override applied.
///
/// An override the user asked for but that cannot be read is an error: the
/// compiled-in values are known not to match in that case.
pub fn load_overrides(config: &HudConfig) -> mhud::Result<(GameLayout, SignatureSet)> {
    let layout = match &config.layout_path {
        Some(path) => {
            let layout = load_layout(path)?;
            info!("Loaded memory layout from {:?}", path);
            layout
        }
        None => GameLayout::default(),
    };

    let signatures = match &config.signatures_path {
        Some(path) => {
            let signatures = load_signatures(path)?;
            info!("Loaded signatures version: {}", signatures.version);
            signatures
        }
        None => builtin_signatures(),
    };

    Ok((layout, signatures))
}
