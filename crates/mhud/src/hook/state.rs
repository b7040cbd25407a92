use std::sync::atomic::{AtomicU8, Ordering};

use strum::{Display, FromRepr};

/// Lifecycle of the frame-presentation redirect. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, Display)]
#[repr(u8)]
pub enum InterceptionState {
    Idle = 0,
    Installed = 1,
    Running = 2,
    CleanupRequested = 3,
    CleanedUp = 4,
    Uninstalled = 5,
    /// Startup failed; the host ends the injected thread
    Failed = 6,
}

impl InterceptionState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_advance_to(self, next: InterceptionState) -> bool {
        use InterceptionState::*;
        matches!(
            (self, next),
            (Idle, Installed)
                | (Idle, Failed)
                | (Installed, Running)
                | (Installed, Failed)
                | (Installed, CleanupRequested)
                | (Running, CleanupRequested)
                | (CleanupRequested, CleanedUp)
                | (CleanedUp, Uninstalled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Uninstalled | Self::Failed)
    }
}

/// State cell shared between the control thread and the render thread.
#[derive(Debug)]
pub struct AtomicState(AtomicU8);

impl AtomicState {
    pub fn new(state: InterceptionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> InterceptionState {
        InterceptionState::from_repr(self.0.load(Ordering::Acquire))
            .unwrap_or(InterceptionState::Failed)
    }

    /// Advance to `next`, returning the previous state, or the current state
    /// as the error when the move is not allowed.
    pub fn advance(&self, next: InterceptionState) -> Result<InterceptionState, InterceptionState> {
        let mut current = self.load();
        loop {
            if !current.can_advance_to(next) {
                return Err(current);
            }
            match self.0.compare_exchange(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(current),
                Err(actual) => {
                    current = InterceptionState::from_repr(actual)
                        .unwrap_or(InterceptionState::Failed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        let state = AtomicState::new(InterceptionState::Idle);
        for next in [
            InterceptionState::Installed,
            InterceptionState::Running,
            InterceptionState::CleanupRequested,
            InterceptionState::CleanedUp,
            InterceptionState::Uninstalled,
        ] {
            assert!(state.advance(next).is_ok(), "advance to {}", next);
        }
        assert!(state.load().is_terminal());
    }

    #[test]
    fn test_no_restart_after_uninstall() {
        let state = AtomicState::new(InterceptionState::Uninstalled);
        assert_eq!(
            state.advance(InterceptionState::Installed),
            Err(InterceptionState::Uninstalled)
        );
    }

    #[test]
    fn test_running_cannot_fail() {
        assert!(!InterceptionState::Running.can_advance_to(InterceptionState::Failed));
        assert!(InterceptionState::Idle.can_advance_to(InterceptionState::Failed));
    }

    #[test]
    fn test_skipping_states_is_rejected() {
        let state = AtomicState::new(InterceptionState::Running);
        assert_eq!(
            state.advance(InterceptionState::Uninstalled),
            Err(InterceptionState::Running)
        );
        assert_eq!(state.load(), InterceptionState::Running);
    }
}
