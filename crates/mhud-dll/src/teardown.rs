//! Who gets to unload the library.
//!
//! Stop can arrive twice: once from the render thread after a frame failure
//! and once from the injector. Only the first caller tears down and frees the
//! library; a second `FreeLibraryAndExitThread` would unmap the code the first
//! one is still running.

use std::sync::atomic::{AtomicBool, Ordering};

pub struct TeardownGuard {
    claimed: AtomicBool,
}

impl TeardownGuard {
    pub const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
        }
    }

    /// True for exactly one caller, which then owns the unload.
    pub fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

impl Default for TeardownGuard {
    fn default() -> Self {
        Self::new()
    }
}
