//! Offset searcher for the game module
//!
//! Two-phase search:
//! 1. `playerManager` captures the address of the static PlayerManager
//!    pointer slot (4 bytes).
//! 2. `playerList` embeds that address into its own template and captures the
//!    player list offset inside the PlayerManager (2 bytes).

use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::ReadMemory;
use crate::module::ResolvedModule;
use crate::offset::{
    PLAYER_LIST, PLAYER_MANAGER, ResolvedOffsets, SignatureScanner, SignatureSet,
};

const MANAGER_SLOT_BYTES: usize = 4;
const PLAYER_LIST_BYTES: usize = 2;

pub struct OffsetSearcher<'a, R: ReadMemory + ?Sized> {
    reader: &'a R,
    module: ResolvedModule,
}

impl<'a, R: ReadMemory + ?Sized> OffsetSearcher<'a, R> {
    pub fn new(reader: &'a R, module: ResolvedModule) -> Self {
        Self { reader, module }
    }

    pub fn search_all(&self, signatures: &SignatureSet) -> Result<ResolvedOffsets> {
        debug!("Starting signature-based offset detection...");

        debug!("Phase 1: Searching PlayerManager instance slot...");
        let slot = self.capture(signatures, PLAYER_MANAGER, MANAGER_SLOT_BYTES, None)?;
        let manager_slot = u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]);
        debug!("  PlayerManager instance slot: 0x{:X}", manager_slot);

        debug!("Phase 2: Searching PlayerList offset...");
        let list = self.capture(signatures, PLAYER_LIST, PLAYER_LIST_BYTES, Some(manager_slot))?;
        let player_list_offset = u16::from_le_bytes([list[0], list[1]]);
        debug!("  PlayerList offset: 0x{:X}", player_list_offset);

        Ok(ResolvedOffsets {
            version: signatures.version.clone(),
            manager_slot: manager_slot as u64,
            player_list_offset,
        })
    }

    /// Scan the module for a named signature and return its first `required`
    /// captured bytes.
    fn capture(
        &self,
        signatures: &SignatureSet,
        name: &str,
        required: usize,
        embed: Option<u32>,
    ) -> Result<Vec<u8>> {
        let entry = signatures
            .entry(name)
            .ok_or_else(|| Error::InvalidSignature(format!("No signature named '{}'", name)))?;

        let mut signature = entry.signature()?;
        if let (Some(position), Some(value)) = (entry.embed_at, embed) {
            signature = signature.with_literal_u32(position, value)?;
        }

        if signature.capture_count() < required {
            return Err(Error::InvalidSignature(format!(
                "Signature '{}' captures {} bytes, need at least {}",
                name,
                signature.capture_count(),
                required
            )));
        }

        let captured = SignatureScanner::new(self.reader).scan(
            self.module.base,
            self.module.size as usize,
            &signature,
        );

        if captured.len() < required {
            return Err(Error::SignatureNotFound {
                name: name.to_string(),
                found: captured.len(),
                required,
            });
        }

        let per_match = signature.capture_count();
        if captured.len() > per_match {
            debug!(
                "  '{}' matched {} times, using the first match",
                name,
                captured.len() / per_match
            );
        }

        Ok(captured[..required].to_vec())
    }
}
