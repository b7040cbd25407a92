//! State shared between the render thread (detour body) and the control
//! thread (start/stop).
//!
//! Cross-thread hand-off uses flags only: the control thread raises
//! `should_cleanup`, the render thread runs cleanup on its next frame and
//! raises `cleanup_done`. The session mutex is uncontended in steady state;
//! the control thread only takes it once the redirect is gone.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use tracing::{error, info, trace, warn};

use crate::error::{Error, Result};
use crate::game::GameReader;
use crate::hook::state::AtomicState;
use crate::hook::{FrameHandle, InterceptionState, Presenter};
use crate::memory::ReadMemory;

/// Everything the detour needs to draw a frame.
pub struct FrameSession<P, R: ReadMemory> {
    pub presenter: P,
    pub game: GameReader<R>,
}

pub type StopRequester = Box<dyn Fn() + Send + Sync>;

pub struct DetourContext<P: Presenter, R: ReadMemory + Send> {
    state: AtomicState,
    should_cleanup: AtomicBool,
    cleanup_claimed: AtomicBool,
    cleanup_done: AtomicBool,
    frame_failed: AtomicBool,
    original: AtomicUsize,
    frames: AtomicU64,
    cleanup_error: Mutex<Option<String>>,
    session: Mutex<Option<FrameSession<P, R>>>,
    stop_requester: StopRequester,
}

impl<P: Presenter, R: ReadMemory + Send> DetourContext<P, R> {
    pub fn new(stop_requester: StopRequester) -> Self {
        Self {
            state: AtomicState::new(InterceptionState::Idle),
            should_cleanup: AtomicBool::new(false),
            cleanup_claimed: AtomicBool::new(false),
            cleanup_done: AtomicBool::new(false),
            frame_failed: AtomicBool::new(false),
            original: AtomicUsize::new(0),
            frames: AtomicU64::new(0),
            cleanup_error: Mutex::new(None),
            session: Mutex::new(None),
            stop_requester,
        }
    }

    pub fn state(&self) -> InterceptionState {
        self.state.load()
    }

    pub(crate) fn advance(&self, next: InterceptionState) -> Result<InterceptionState> {
        let from = self
            .state
            .advance(next)
            .map_err(|from| Error::InvalidTransition { from, to: next })?;
        info!("Interception state: {} -> {}", from, next);
        Ok(from)
    }

    /// Entry the detour forwards to
    pub fn original(&self) -> usize {
        self.original.load(Ordering::Acquire)
    }

    pub(crate) fn set_original(&self, original: usize) {
        self.original.store(original, Ordering::Release);
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn frame_failed(&self) -> bool {
        self.frame_failed.load(Ordering::Acquire)
    }

    pub fn cleanup_requested(&self) -> bool {
        self.should_cleanup.load(Ordering::Acquire)
    }

    pub fn cleanup_done(&self) -> bool {
        self.cleanup_done.load(Ordering::Acquire)
    }

    pub(crate) fn request_cleanup(&self) {
        self.should_cleanup.store(true, Ordering::Release);
    }

    pub(crate) fn cleanup_error(&self) -> Option<String> {
        lock(&self.cleanup_error).clone()
    }

    pub(crate) fn attach(&self, session: FrameSession<P, R>) {
        *lock(&self.session) = Some(session);
    }

    pub(crate) fn take_session(&self) -> Option<FrameSession<P, R>> {
        lock(&self.session).take()
    }

    /// Take the session unless a frame is holding it. `None` means a render
    /// thread is still inside the session and it was left in place.
    pub(crate) fn try_take_session(&self) -> Option<Option<FrameSession<P, R>>> {
        match self.session.try_lock() {
            Ok(mut guard) => Some(guard.take()),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner().take()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Detour body. Runs on the render thread once per presented frame and
    /// always hands the call to `forward` with the original entry.
    pub fn on_frame<T>(&self, frame: FrameHandle, forward: impl FnOnce(usize) -> T) -> T {
        self.frames.fetch_add(1, Ordering::Relaxed);

        if self.cleanup_requested() {
            self.run_cleanup();
        } else if !self.frame_failed() && !frame.is_null() {
            if let Err(e) = self.customize(frame) {
                // First failure only; later frames skip customization
                if !self.frame_failed.swap(true, Ordering::AcqRel) {
                    error!("Frame customization failed, requesting stop: {}", e);
                    (self.stop_requester)();
                }
            }
        }

        forward(self.original())
    }

    fn customize(&self, frame: FrameHandle) -> Result<()> {
        let mut guard = self
            .session
            .lock()
            .map_err(|_| Error::FrameCustomization("frame session poisoned".to_string()))?;
        let Some(session) = guard.as_mut() else {
            trace!("Frame without session");
            return Ok(());
        };

        let snapshot = session.game.snapshot();
        session.presenter.customize_frame(frame, &snapshot)
    }

    /// Run presenter cleanup on the calling thread unless another caller
    /// already claimed it. Returns whether this call ran it.
    pub(crate) fn run_cleanup(&self) -> bool {
        if self
            .cleanup_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        info!("Running presenter cleanup");
        let result = match lock(&self.session).as_mut() {
            Some(session) => session.presenter.cleanup(),
            None => Ok(()),
        };
        if let Err(e) = result {
            warn!("Presenter cleanup failed: {}", e);
            *lock(&self.cleanup_error) = Some(e.to_string());
        }

        self.cleanup_done.store(true, Ordering::Release);
        true
    }

    /// Keep a late render-thread call from starting cleanup after the
    /// control thread gave up waiting. False when cleanup already started.
    pub(crate) fn abandon_cleanup(&self) -> bool {
        self.cleanup_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
