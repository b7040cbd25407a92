use crate::error::Result;
use crate::game::HudSnapshot;
use crate::module::ResolvedModule;

/// Opaque frame argument of the intercepted call (a device context handle on
/// Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle(pub usize);

impl FrameHandle {
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// An installed redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookHandle {
    pub symbol: String,
    /// Address of the patched indirection slot
    pub slot: u64,
    /// Entry the slot held before the redirect
    pub original: usize,
}

/// Installs and toggles a redirect on an imported entry point.
///
/// `install` records the redirect without activating it; only `enable` and
/// `disable` change which entry the game calls.
pub trait FrameHook {
    fn install(
        &mut self,
        module: &ResolvedModule,
        library: &str,
        symbol: &str,
        detour: usize,
    ) -> Result<HookHandle>;

    /// Point the game at the detour. Returns the original entry.
    fn enable(&mut self, symbol: &str) -> Result<usize>;

    /// Point the game back at the original entry.
    fn disable(&mut self, symbol: &str) -> Result<()>;
}

/// Draws the overlay. Called only from the render thread.
pub trait Presenter: Send {
    fn customize_frame(&mut self, frame: FrameHandle, snapshot: &HudSnapshot) -> Result<()>;

    /// Release render-thread resources. Runs once, on the render thread.
    fn cleanup(&mut self) -> Result<()>;
}
