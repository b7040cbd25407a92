//! # mhud
//!
//! Core library for MissingHUD, a stat overlay for The Binding of Isaac:
//! Rebirth.
//!
//! This crate provides:
//! - Process memory access (in-process or attached from outside)
//! - Module header validation and import table lookup
//! - Signature scanning for the PlayerManager pointer slot
//! - Pointer chains to the live player and floor state
//! - Stat change tracking and the Deal with the Devil chance
//! - The interception lifecycle for the per-frame presentation call
//!
//! Rendering and the actual Windows entry points live in `mhud-dll`.

pub mod config;
pub mod error;
pub mod game;
pub mod hook;
pub mod memory;
pub mod module;
pub mod offset;

pub use config::{CONFIG_FILE_NAME, HudConfig, HudConfigBuilder};
pub use error::{Error, Result};
pub use game::{
    ChanceInputs, GameReader, HudSnapshot, PlayerStat, PointerChainResolver, ProbabilityModel,
    ProbabilityState, StatKind, StatReading, StatTracker,
};
pub use hook::{
    CleanupOutcome, DetourContext, FrameHandle, FrameHook, HookHandle, ImportTableHook,
    InterceptionLifecycle, InterceptionState, Presenter, ShutdownReport,
};
pub use memory::{
    GameLayout, MemoryReader, ProcessHandle, ReadMemory, WriteMemory, load_layout, save_layout,
};
pub use module::{ImageKind, ModuleLocator, ResolvedModule, find_import_slot};
pub use offset::{
    MemorySignature, OffsetSearcher, ResolvedOffsets, SigByte, SignatureScanner, SignatureSet,
    builtin_signatures, load_offsets, load_signatures, save_offsets, save_signatures, scan_slice,
};
