//! Import address table redirection.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::hook::{FrameHook, HookHandle};
use crate::memory::{ReadMemory, WriteMemory};
use crate::module::{ImageKind, ResolvedModule, find_import_slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IatEntry {
    pub slot: u64,
    pub original: usize,
    pub detour: usize,
    pub kind: ImageKind,
    pub enabled: bool,
}

/// [`FrameHook`] that swaps the game module's IAT slot for a symbol.
///
/// The entry table is the only place that knows both the original and the
/// detour address; nothing global is written besides the slot itself.
pub struct ImportTableHook<M: ReadMemory + WriteMemory> {
    memory: M,
    entries: HashMap<String, IatEntry>,
}

impl<M: ReadMemory + WriteMemory> ImportTableHook<M> {
    pub fn new(memory: M) -> Self {
        Self {
            memory,
            entries: HashMap::new(),
        }
    }

    pub fn entry(&self, symbol: &str) -> Option<&IatEntry> {
        self.entries.get(symbol)
    }

    pub fn is_enabled(&self, symbol: &str) -> bool {
        self.entries.get(symbol).is_some_and(|e| e.enabled)
    }

    fn entry_mut(&mut self, symbol: &str) -> Result<&mut IatEntry> {
        self.entries
            .get_mut(symbol)
            .ok_or_else(|| Error::HookNotInstalled(symbol.to_string()))
    }

    fn write_slot(memory: &M, entry: &IatEntry, target: usize) -> Result<()> {
        match entry.kind {
            ImageKind::Pe32 => {
                let target = u32::try_from(target).map_err(|_| {
                    Error::Hook(format!("Entry {:#x} does not fit a 32-bit slot", target))
                })?;
                memory.write_u32(entry.slot, target)
            }
            ImageKind::Pe32Plus => memory.write_u64(entry.slot, target as u64),
        }
    }
}

impl<M: ReadMemory + WriteMemory> FrameHook for ImportTableHook<M> {
    fn install(
        &mut self,
        module: &ResolvedModule,
        library: &str,
        symbol: &str,
        detour: usize,
    ) -> Result<HookHandle> {
        if self.entries.contains_key(symbol) {
            return Err(Error::Hook(format!("{} is already hooked", symbol)));
        }
        if detour == 0 {
            return Err(Error::Hook("Detour entry is null".to_string()));
        }

        let slot = find_import_slot(&self.memory, module, library, symbol)?;
        let original = match module.kind {
            ImageKind::Pe32 => self.memory.read_u32(slot)? as usize,
            ImageKind::Pe32Plus => self.memory.read_u64(slot)? as usize,
        };
        if original == 0 {
            return Err(Error::Hook(format!(
                "IAT slot for {}!{} is not bound",
                library, symbol
            )));
        }

        debug!(
            "Installed {}!{} redirect: slot {:#x}, original {:#x}, detour {:#x}",
            library, symbol, slot, original, detour
        );
        self.entries.insert(
            symbol.to_string(),
            IatEntry {
                slot,
                original,
                detour,
                kind: module.kind,
                enabled: false,
            },
        );

        Ok(HookHandle {
            symbol: symbol.to_string(),
            slot,
            original,
        })
    }

    fn enable(&mut self, symbol: &str) -> Result<usize> {
        let entry = *self.entry_mut(symbol)?;
        Self::write_slot(&self.memory, &entry, entry.detour)?;
        self.entry_mut(symbol)?.enabled = true;
        info!("{} redirect enabled", symbol);
        Ok(entry.original)
    }

    fn disable(&mut self, symbol: &str) -> Result<()> {
        let entry = *self.entry_mut(symbol)?;
        Self::write_slot(&self.memory, &entry, entry.original)?;
        self.entry_mut(symbol)?.enabled = false;
        info!("{} redirect disabled", symbol);
        Ok(())
    }
}
