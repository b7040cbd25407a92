//! Executable image inspection: header validation and import table lookup.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::memory::ReadMemory;

const DOS_SIGNATURE: u16 = 0x5A4D; // "MZ"
const NT_SIGNATURE: u32 = 0x0000_4550; // "PE\0\0"
const PE32_MAGIC: u16 = 0x010B;
const PE32_PLUS_MAGIC: u16 = 0x020B;

const E_LFANEW: u64 = 0x3C;
/// Signature (4) + IMAGE_FILE_HEADER (20)
const OPTIONAL_HEADER: u64 = 24;
const SIZE_OF_IMAGE: u64 = 56;

const IMPORT_DESCRIPTOR_SIZE: u64 = 20;
const MAX_IMPORT_DESCRIPTORS: u64 = 1024;
const MAX_THUNKS: u64 = 4096;
const MAX_NAME_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageKind {
    Pe32,
    Pe32Plus,
}

impl ImageKind {
    pub fn pointer_size(self) -> u64 {
        match self {
            Self::Pe32 => 4,
            Self::Pe32Plus => 8,
        }
    }

    fn import_directory(self) -> u64 {
        match self {
            Self::Pe32 => 104,
            Self::Pe32Plus => 120,
        }
    }

    fn ordinal_flag(self) -> u64 {
        match self {
            Self::Pe32 => 1 << 31,
            Self::Pe32Plus => 1 << 63,
        }
    }
}

/// The game's primary executable image as mapped in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedModule {
    pub base: u64,
    pub size: u32,
    pub kind: ImageKind,
}

impl ResolvedModule {
    pub fn end(&self) -> u64 {
        self.base + self.size as u64
    }

    pub fn contains(&self, address: u64) -> bool {
        (self.base..self.end()).contains(&address)
    }
}

pub struct ModuleLocator;

impl ModuleLocator {
    /// Validate the image headers at the reader's base address and read the
    /// declared in-memory image size.
    pub fn locate<R: ReadMemory + ?Sized>(reader: &R) -> Result<ResolvedModule> {
        let base = reader.base_address();
        if base == 0 {
            return Err(Error::ModuleResolution(
                "Module base address is null".to_string(),
            ));
        }

        let header_err =
            |e: Error| Error::ModuleResolution(format!("Unable to read image header: {}", e));

        let dos_magic = reader.read_u16(base).map_err(header_err)?;
        let e_lfanew = reader.read_u32(base + E_LFANEW).map_err(header_err)?;
        let nt = base + e_lfanew as u64;
        let nt_signature = reader.read_u32(nt).map_err(header_err)?;

        if dos_magic != DOS_SIGNATURE || nt_signature != NT_SIGNATURE {
            return Err(Error::ModuleResolution(
                "The module memory being accessed is not a valid image".to_string(),
            ));
        }

        let optional = nt + OPTIONAL_HEADER;
        let kind = match reader.read_u16(optional).map_err(header_err)? {
            PE32_MAGIC => ImageKind::Pe32,
            PE32_PLUS_MAGIC => ImageKind::Pe32Plus,
            other => {
                return Err(Error::ModuleResolution(format!(
                    "Unknown optional header magic {:#x}",
                    other
                )));
            }
        };

        let size = reader
            .read_u32(optional + SIZE_OF_IMAGE)
            .map_err(header_err)?;
        if size == 0 {
            return Err(Error::ModuleResolution("Image size is zero".to_string()));
        }

        info!("Game module address: {:#x}", base);
        info!("Game module size: {:#x}", size);

        Ok(ResolvedModule { base, size, kind })
    }
}

/// Address of the import address table slot through which `module` calls
/// `library!symbol`.
pub fn find_import_slot<R: ReadMemory + ?Sized>(
    reader: &R,
    module: &ResolvedModule,
    library: &str,
    symbol: &str,
) -> Result<u64> {
    let not_found = || Error::ImportNotFound {
        library: library.to_string(),
        symbol: symbol.to_string(),
    };

    let base = module.base;
    let e_lfanew = reader.read_u32(base + E_LFANEW)? as u64;
    let directory = base + e_lfanew + OPTIONAL_HEADER + module.kind.import_directory();
    let import_rva = reader.read_u32(directory)? as u64;
    if import_rva == 0 {
        return Err(not_found());
    }

    let thunk_size = module.kind.pointer_size();
    for index in 0..MAX_IMPORT_DESCRIPTORS {
        let descriptor = base + import_rva + index * IMPORT_DESCRIPTOR_SIZE;
        let lookup_rva = reader.read_u32(descriptor)? as u64;
        let name_rva = reader.read_u32(descriptor + 12)? as u64;
        let iat_rva = reader.read_u32(descriptor + 16)? as u64;

        if lookup_rva == 0 && name_rva == 0 && iat_rva == 0 {
            break;
        }
        if name_rva == 0 || iat_rva == 0 {
            continue;
        }

        let name = reader.read_cstring(base + name_rva, MAX_NAME_LEN)?;
        if !name.eq_ignore_ascii_case(library) {
            continue;
        }
        debug!("Found import descriptor for {}", name);

        // Bound imports leave only the IAT; fall back to it for names
        let names_rva = if lookup_rva != 0 { lookup_rva } else { iat_rva };
        for slot in 0..MAX_THUNKS {
            let thunk_addr = base + names_rva + slot * thunk_size;
            let thunk = match module.kind {
                ImageKind::Pe32 => reader.read_u32(thunk_addr)? as u64,
                ImageKind::Pe32Plus => reader.read_u64(thunk_addr)?,
            };
            if thunk == 0 {
                break;
            }
            if thunk & module.kind.ordinal_flag() != 0 {
                continue;
            }

            // IMAGE_IMPORT_BY_NAME: u16 hint followed by the name
            let import_name =
                reader.read_cstring(base + (thunk & 0x7FFF_FFFF) + 2, MAX_NAME_LEN)?;
            if import_name == symbol {
                let slot_addr = base + iat_rva + slot * thunk_size;
                debug!("{}!{} IAT slot at {:#x}", library, symbol, slot_addr);
                return Ok(slot_addr);
            }
        }
    }

    Err(not_found())
}
