use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Addresses and offsets recovered by signature scanning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOffsets {
    pub version: String,
    /// Address of the static slot holding the PlayerManager instance pointer
    pub manager_slot: u64,
    /// Offset of the player list inside the PlayerManager instance
    pub player_list_offset: u16,
}

impl ResolvedOffsets {
    pub fn is_valid(&self) -> bool {
        self.manager_slot != 0 && self.player_list_offset != 0
    }
}

pub fn load_offsets<P: AsRef<Path>>(path: P) -> Result<ResolvedOffsets> {
    let content = fs::read_to_string(&path)?;
    let data = serde_json::from_str(&content)?;
    Ok(data)
}

pub fn save_offsets<P: AsRef<Path>>(path: P, offsets: &ResolvedOffsets) -> Result<()> {
    let content = serde_json::to_string_pretty(offsets)?;
    fs::write(path, content)?;
    Ok(())
}
