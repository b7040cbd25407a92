//! Attaching to the game from outside, shared by the commands.

use std::path::Path;

use anyhow::{Context, Result};
use mhud::{
    MemoryReader, ModuleLocator, OffsetSearcher, ProcessHandle, ResolvedModule, ResolvedOffsets,
    SignatureSet, builtin_signatures, load_signatures,
};
use tracing::{debug, info};

pub struct Attached {
    pub reader: MemoryReader,
    pub module: ResolvedModule,
    pub offsets: ResolvedOffsets,
}

pub fn signatures(path: Option<&Path>) -> Result<SignatureSet> {
    match path {
        Some(path) => {
            let set = load_signatures(path)
                .with_context(|| format!("Failed to load signatures from {}", path.display()))?;
            info!("Loaded signatures version: {}", set.version);
            Ok(set)
        }
        None => Ok(builtin_signatures()),
    }
}

/// Open the process, validate its main image and resolve the offsets.
pub fn attach(process_name: &str, signatures: &SignatureSet) -> Result<Attached> {
    let process = ProcessHandle::find_and_open(process_name)?;
    debug!(
        "Found {} (PID: {}, base: {:#x})",
        process_name, process.pid, process.base_address
    );

    let reader = MemoryReader::new(process);
    let module = ModuleLocator::locate(&reader)?;
    let offsets = OffsetSearcher::new(&reader, module)
        .search_all(signatures)
        .context("Offset search failed; the game build may not match the signatures")?;

    Ok(Attached {
        reader,
        module,
        offsets,
    })
}
