//! # mhud2
//!
//! The library injected into `isaac-ng.exe`. The injector calls
//! `MHUD2_Start` on a fresh thread after loading it; `MHUD2_Stop` runs on its
//! own thread and unloads the library when it is done.
//!
//! Everything platform specific lives behind `cfg(target_os = "windows")`.
//! The remaining modules (startup settings, log file, text layout) build and
//! test anywhere.

#![cfg_attr(not(target_os = "windows"), allow(dead_code))]

mod logging;
mod overlay;
mod startup;
mod teardown;

#[cfg(target_os = "windows")]
mod entry;
#[cfg(target_os = "windows")]
mod gdi;

pub use logging::LOG_FILE_NAME;
pub use overlay::{OverlaySpan, TextColor};
pub use teardown::TeardownGuard;
