//! Frame-presentation interception.

mod context;
mod iat;
mod lifecycle;
mod state;
mod traits;

pub use context::{DetourContext, FrameSession, StopRequester};
pub use iat::{IatEntry, ImportTableHook};
pub use lifecycle::{CleanupOutcome, InterceptionLifecycle, ShutdownReport};
pub use state::{AtomicState, InterceptionState};
pub use traits::{FrameHandle, FrameHook, HookHandle, Presenter};
