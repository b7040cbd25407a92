//! Install, run and tear down the frame-presentation redirect.
//!
//! ```text
//! Idle ──start──► Installed ──enable──► Running
//!  │                  │                    │
//!  └──► Failed        └──────stop──────────┴──► CleanupRequested
//!                                                   │ render thread cleans up
//!                                                   ▼
//!                                               CleanedUp ──grace──► Uninstalled
//! ```
//!
//! There is no way back: after `stop` the host ends the injected thread.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::HudConfig;
use crate::error::{Error, Result};
use crate::game::{GameReader, PointerChainResolver};
use crate::hook::context::{DetourContext, FrameSession, StopRequester};
use crate::hook::{FrameHook, HookHandle, InterceptionState, Presenter};
use crate::memory::{GameLayout, ReadMemory};
use crate::module::{ModuleLocator, ResolvedModule};
use crate::offset::{OffsetSearcher, ResolvedOffsets, SignatureSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Render thread ran cleanup successfully
    Completed,
    /// Render thread ran cleanup and the presenter reported an error
    Failed(String),
    /// Render thread never picked up the request
    TimedOut,
    /// Nothing was installed
    Skipped,
}

/// What happened during `stop`. Teardown always runs to the end; this only
/// reports problems along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub cleanup: CleanupOutcome,
    pub disable_error: Option<String>,
    pub final_state: InterceptionState,
    /// Detour invocations over the lifetime of the redirect
    pub frames: u64,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        matches!(
            self.cleanup,
            CleanupOutcome::Completed | CleanupOutcome::Skipped
        ) && self.disable_error.is_none()
    }
}

pub struct InterceptionLifecycle<H, P, R>
where
    H: FrameHook,
    P: Presenter,
    R: ReadMemory + Send,
{
    hook: H,
    config: HudConfig,
    context: Arc<DetourContext<P, R>>,
    pending: Option<(R, P)>,
    module: Option<ResolvedModule>,
    offsets: Option<ResolvedOffsets>,
    handle: Option<HookHandle>,
}

impl<H, P, R> InterceptionLifecycle<H, P, R>
where
    H: FrameHook,
    P: Presenter,
    R: ReadMemory + Send,
{
    pub fn new(
        hook: H,
        reader: R,
        presenter: P,
        config: HudConfig,
        stop_requester: StopRequester,
    ) -> Self {
        Self {
            hook,
            config,
            context: Arc::new(DetourContext::new(stop_requester)),
            pending: Some((reader, presenter)),
            module: None,
            offsets: None,
            handle: None,
        }
    }

    pub fn state(&self) -> InterceptionState {
        self.context.state()
    }

    /// Shared with the detour. Publish it before calling [`enable`](Self::enable).
    pub fn context(&self) -> Arc<DetourContext<P, R>> {
        Arc::clone(&self.context)
    }

    pub fn module(&self) -> Option<&ResolvedModule> {
        self.module.as_ref()
    }

    pub fn offsets(&self) -> Option<&ResolvedOffsets> {
        self.offsets.as_ref()
    }

    pub fn handle(&self) -> Option<&HookHandle> {
        self.handle.as_ref()
    }

    /// Idle -> Installed. Any failure moves to `Failed`; the memory layout is
    /// unusable at that point and the caller must not retry.
    pub fn start(
        &mut self,
        signatures: &SignatureSet,
        layout: GameLayout,
        detour: usize,
    ) -> Result<()> {
        let state = self.state();
        if state != InterceptionState::Idle {
            return Err(Error::InvalidTransition {
                from: state,
                to: InterceptionState::Installed,
            });
        }

        match self.install(signatures, layout, detour) {
            Ok(()) => {
                self.context.advance(InterceptionState::Installed)?;
                Ok(())
            }
            Err(e) => {
                error!("Startup failed: {}", e);
                self.advance_logged(InterceptionState::Failed);
                Err(e)
            }
        }
    }

    fn install(&mut self, signatures: &SignatureSet, layout: GameLayout, detour: usize) -> Result<()> {
        let (reader, presenter) = self
            .pending
            .take()
            .ok_or_else(|| Error::Hook("Lifecycle already started".to_string()))?;

        let module = ModuleLocator::locate(&reader)?;
        let offsets = OffsetSearcher::new(&reader, module).search_all(signatures)?;
        info!("PlayerManager instance slot: {:#x}", offsets.manager_slot);
        info!("PlayerManager player list offset: {:#x}", offsets.player_list_offset);

        let handle = self.hook.install(
            &module,
            &self.config.hook_library,
            &self.config.hook_symbol,
            detour,
        )?;
        // Known before the slot is patched so the first detour call can forward
        self.context.set_original(handle.original);

        let resolver = PointerChainResolver::new(reader, offsets.clone(), layout);
        let game = GameReader::new(resolver, self.config.stat_window());
        self.context.attach(FrameSession { presenter, game });

        self.module = Some(module);
        self.offsets = Some(offsets);
        self.handle = Some(handle);
        Ok(())
    }

    /// Installed -> Running. Returns the original entry.
    pub fn enable(&mut self) -> Result<usize> {
        let state = self.state();
        if state != InterceptionState::Installed {
            return Err(Error::InvalidTransition {
                from: state,
                to: InterceptionState::Running,
            });
        }

        let original = self.hook.enable(&self.config.hook_symbol)?;
        self.context.set_original(original);
        self.context.advance(InterceptionState::Running)?;
        Ok(original)
    }

    /// Tear everything down. Never fails; problems are logged and reported.
    pub fn stop(mut self) -> ShutdownReport {
        let from = self.state();
        if !matches!(
            from,
            InterceptionState::Installed | InterceptionState::Running
        ) {
            info!("Nothing to stop in state {}", from);
            return ShutdownReport {
                cleanup: CleanupOutcome::Skipped,
                disable_error: None,
                final_state: from,
                frames: self.context.frames(),
            };
        }

        self.advance_logged(InterceptionState::CleanupRequested);
        self.context.request_cleanup();

        let cleanup = if from == InterceptionState::Running {
            self.wait_for_cleanup()
        } else {
            // The detour was never reachable; no render thread owns anything
            self.context.run_cleanup();
            self.cleanup_result()
        };

        let disable_error = if from == InterceptionState::Running {
            match self.hook.disable(&self.config.hook_symbol) {
                Ok(()) => None,
                Err(e) => {
                    error!("Failed to disable redirect: {}", e);
                    Some(e.to_string())
                }
            }
        } else {
            None
        };

        self.advance_logged(InterceptionState::CleanedUp);
        thread::sleep(self.config.unhook_grace());

        if cleanup == CleanupOutcome::TimedOut {
            // A frame stuck in the presenter still holds the session; waiting
            // on it would make the bounded stop unbounded
            match self.context.try_take_session() {
                Some(session) => drop(session),
                None => warn!("Frame still in progress, leaving its session behind"),
            }
        } else {
            drop(self.context.take_session());
        }
        self.handle = None;
        self.advance_logged(InterceptionState::Uninstalled);

        let report = ShutdownReport {
            cleanup,
            disable_error,
            final_state: self.state(),
            frames: self.context.frames(),
        };
        info!("Shutdown finished after {} frames", report.frames);
        report
    }

    fn wait_for_cleanup(&self) -> CleanupOutcome {
        let timeout = self.config.cleanup_timeout();
        let poll = self.config.cleanup_poll();
        let mut deadline = Instant::now() + timeout;
        let mut extended = false;

        loop {
            if self.context.cleanup_done() {
                return self.cleanup_result();
            }
            if Instant::now() >= deadline {
                if self.context.abandon_cleanup() || extended {
                    warn!("Render thread did not clean up within {:?}", timeout);
                    return CleanupOutcome::TimedOut;
                }
                // Render thread is inside cleanup right now; give it one more round
                extended = true;
                deadline = Instant::now() + timeout;
            }
            thread::sleep(poll);
        }
    }

    fn cleanup_result(&self) -> CleanupOutcome {
        match self.context.cleanup_error() {
            Some(message) => CleanupOutcome::Failed(message),
            None => CleanupOutcome::Completed,
        }
    }

    fn advance_logged(&self, next: InterceptionState) {
        if let Err(e) = self.context.advance(next) {
            warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::game::HudSnapshot;
    use crate::hook::FrameHandle;
    use crate::memory::{MockMemoryBuilder, MockMemoryReader, PeImageBuilder, game_image};
    use crate::offset::builtin_signatures;

    const BASE: u64 = 0x0040_0000;
    const ORIGINAL: usize = 0x7700_1000;
    const DETOUR: usize = 0x1000_2000;

    #[derive(Clone, Default)]
    struct EventLog(Arc<Mutex<Vec<&'static str>>>);

    impl EventLog {
        fn push(&self, event: &'static str) {
            self.0.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().clone()
        }
    }

    struct RecordingHook {
        log: EventLog,
        fail_disable: bool,
    }

    impl FrameHook for RecordingHook {
        fn install(
            &mut self,
            module: &ResolvedModule,
            _library: &str,
            symbol: &str,
            detour: usize,
        ) -> Result<HookHandle> {
            assert_eq!(detour, DETOUR);
            self.log.push("install");
            Ok(HookHandle {
                symbol: symbol.to_string(),
                slot: module.base + 0x300,
                original: ORIGINAL,
            })
        }

        fn enable(&mut self, _symbol: &str) -> Result<usize> {
            self.log.push("enable");
            Ok(ORIGINAL)
        }

        fn disable(&mut self, _symbol: &str) -> Result<()> {
            self.log.push("disable");
            if self.fail_disable {
                return Err(Error::Hook("slot protection changed".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counters {
        frames: AtomicUsize,
        cleanups: AtomicUsize,
        stop_requests: AtomicUsize,
    }

    struct RecordingPresenter {
        log: EventLog,
        counters: Arc<Counters>,
        fail_frames: bool,
        /// Blocks inside `customize_frame` until released
        gate: Option<(Sender<()>, Receiver<()>)>,
    }

    impl Presenter for RecordingPresenter {
        fn customize_frame(&mut self, _frame: FrameHandle, _snapshot: &HudSnapshot) -> Result<()> {
            self.counters.frames.fetch_add(1, Ordering::SeqCst);
            if let Some((entered, release)) = &self.gate {
                let _ = entered.send(());
                let _ = release.recv();
            }
            if self.fail_frames {
                return Err(Error::FrameCustomization("context lost".to_string()));
            }
            Ok(())
        }

        fn cleanup(&mut self) -> Result<()> {
            self.counters.cleanups.fetch_add(1, Ordering::SeqCst);
            self.log.push("cleanup");
            Ok(())
        }
    }

    type TestLifecycle = InterceptionLifecycle<RecordingHook, RecordingPresenter, MockMemoryReader>;

    struct Harness {
        log: EventLog,
        counters: Arc<Counters>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                log: EventLog::default(),
                counters: Arc::new(Counters::default()),
            }
        }

        fn config() -> HudConfig {
            HudConfig::builder()
                .cleanup_timeout(Duration::from_secs(5))
                .cleanup_poll(Duration::from_millis(1))
                .unhook_grace(Duration::from_millis(5))
                .build()
        }

        fn game_memory() -> MockMemoryReader {
            let image = game_image(BASE as u32 + 0xF00, 0x8BB8, ORIGINAL as u32);
            MockMemoryBuilder::new(BASE, 0x1000)
                .write_bytes(BASE, &image.bytes)
                .build()
        }

        fn lifecycle_with(
            &self,
            memory: MockMemoryReader,
            config: HudConfig,
            fail_frames: bool,
            fail_disable: bool,
            gate: Option<(Sender<()>, Receiver<()>)>,
        ) -> TestLifecycle {
            let hook = RecordingHook {
                log: self.log.clone(),
                fail_disable,
            };
            let presenter = RecordingPresenter {
                log: self.log.clone(),
                counters: Arc::clone(&self.counters),
                fail_frames,
                gate,
            };
            let counters = Arc::clone(&self.counters);
            let stop_requester: StopRequester = Box::new(move || {
                counters.stop_requests.fetch_add(1, Ordering::SeqCst);
            });
            InterceptionLifecycle::new(hook, memory, presenter, config, stop_requester)
        }

        fn running(&self) -> TestLifecycle {
            self.running_with(Self::config(), false, false, None)
        }

        fn running_with(
            &self,
            config: HudConfig,
            fail_frames: bool,
            fail_disable: bool,
            gate: Option<(Sender<()>, Receiver<()>)>,
        ) -> TestLifecycle {
            let mut lifecycle =
                self.lifecycle_with(Self::game_memory(), config, fail_frames, fail_disable, gate);
            lifecycle
                .start(&builtin_signatures(), GameLayout::default(), DETOUR)
                .unwrap();
            assert_eq!(lifecycle.enable().unwrap(), ORIGINAL);
            lifecycle
        }

        fn cleanups(&self) -> usize {
            self.counters.cleanups.load(Ordering::SeqCst)
        }
    }

    /// Simulated render thread presenting frames until `running` drops
    fn render_loop(
        ctx: Arc<DetourContext<RecordingPresenter, MockMemoryReader>>,
        running: Arc<AtomicBool>,
        forwarded: Arc<AtomicUsize>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let target = ctx.on_frame(FrameHandle(0xDC), |original| original);
                assert_eq!(target, ORIGINAL);
                forwarded.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(1));
            }
        })
    }

    #[test]
    fn test_start_resolves_and_installs() {
        let harness = Harness::new();
        let lifecycle = harness.running();

        assert_eq!(lifecycle.state(), InterceptionState::Running);
        let offsets = lifecycle.offsets().unwrap();
        assert_eq!(offsets.manager_slot, BASE + 0xF00);
        assert_eq!(offsets.player_list_offset, 0x8BB8);
        assert_eq!(lifecycle.module().unwrap().base, BASE);
        assert_eq!(lifecycle.handle().unwrap().symbol, "SwapBuffers");
        assert_eq!(lifecycle.context().original(), ORIGINAL);
        assert_eq!(harness.log.events(), vec!["install", "enable"]);
    }

    #[test]
    fn test_start_failure_is_terminal() {
        let harness = Harness::new();
        let image = PeImageBuilder::new(0x1000).build();
        let memory = MockMemoryBuilder::new(BASE, 0x1000)
            .write_bytes(BASE, &image.bytes)
            .build();
        let mut lifecycle = harness.lifecycle_with(memory, Harness::config(), false, false, None);

        let err = lifecycle
            .start(&builtin_signatures(), GameLayout::default(), DETOUR)
            .unwrap_err();
        assert!(err.is_fatal_at_startup());
        assert_eq!(lifecycle.state(), InterceptionState::Failed);
        assert!(harness.log.events().is_empty());

        assert!(matches!(
            lifecycle.enable(),
            Err(Error::InvalidTransition { .. })
        ));
        let report = lifecycle.stop();
        assert_eq!(report.final_state, InterceptionState::Failed);
        assert_eq!(report.cleanup, CleanupOutcome::Skipped);
    }

    #[test]
    fn test_enable_requires_install() {
        let harness = Harness::new();
        let mut lifecycle =
            harness.lifecycle_with(Harness::game_memory(), Harness::config(), false, false, None);
        let err = lifecycle.enable().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: InterceptionState::Idle,
                to: InterceptionState::Running
            }
        ));
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let harness = Harness::new();
        let mut lifecycle = harness.running();
        let err = lifecycle
            .start(&builtin_signatures(), GameLayout::default(), DETOUR)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(lifecycle.state(), InterceptionState::Running);
    }

    #[test]
    fn test_detour_always_forwards_original() {
        let harness = Harness::new();
        let lifecycle = harness.running();
        let ctx = lifecycle.context();

        assert_eq!(ctx.on_frame(FrameHandle(0xDC), |original| original), ORIGINAL);
        // Null frames are forwarded without customization
        assert_eq!(ctx.on_frame(FrameHandle(0), |original| original + 1), ORIGINAL + 1);
        assert_eq!(harness.counters.frames.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.frames(), 2);
    }

    #[test]
    fn test_frame_failure_requests_stop_once() {
        let harness = Harness::new();
        let lifecycle = harness.running_with(Harness::config(), true, false, None);
        let ctx = lifecycle.context();

        for _ in 0..5 {
            assert_eq!(ctx.on_frame(FrameHandle(0xDC), |original| original), ORIGINAL);
        }

        assert!(ctx.frame_failed());
        assert_eq!(harness.counters.frames.load(Ordering::SeqCst), 1);
        assert_eq!(harness.counters.stop_requests.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_hands_cleanup_to_render_thread() {
        let harness = Harness::new();
        let lifecycle = harness.running();
        let running = Arc::new(AtomicBool::new(true));
        let forwarded = Arc::new(AtomicUsize::new(0));
        let render = render_loop(lifecycle.context(), Arc::clone(&running), Arc::clone(&forwarded));

        let report = lifecycle.stop();
        running.store(false, Ordering::SeqCst);
        render.join().unwrap();

        assert_eq!(report.cleanup, CleanupOutcome::Completed);
        assert_eq!(report.final_state, InterceptionState::Uninstalled);
        assert!(report.is_clean());
        assert_eq!(harness.cleanups(), 1);
        assert_eq!(
            harness.log.events(),
            vec!["install", "enable", "cleanup", "disable"]
        );
        assert!(forwarded.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_stop_during_customization_cleans_up_exactly_once() {
        let harness = Harness::new();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let lifecycle =
            harness.running_with(Harness::config(), false, false, Some((entered_tx, release_rx)));
        let ctx = lifecycle.context();

        let running = Arc::new(AtomicBool::new(true));
        let forwarded = Arc::new(AtomicUsize::new(0));
        let render = render_loop(Arc::clone(&ctx), Arc::clone(&running), Arc::clone(&forwarded));

        // Render thread is now parked inside customize_frame
        entered_rx.recv().unwrap();
        let stopper = thread::spawn(move || lifecycle.stop());

        while !ctx.cleanup_requested() {
            thread::sleep(Duration::from_millis(1));
        }
        // Stop must not get past cleanup while the frame is still in flight
        thread::sleep(Duration::from_millis(20));
        assert!(!harness.log.events().contains(&"disable"));
        assert_eq!(harness.cleanups(), 0);

        release_tx.send(()).unwrap();
        let report = stopper.join().unwrap();
        running.store(false, Ordering::SeqCst);
        render.join().unwrap();

        assert_eq!(report.cleanup, CleanupOutcome::Completed);
        assert_eq!(harness.cleanups(), 1);
        assert_eq!(harness.counters.frames.load(Ordering::SeqCst), 1);
        assert_eq!(
            harness.log.events(),
            vec!["install", "enable", "cleanup", "disable"]
        );
        assert_eq!(ctx.state(), InterceptionState::Uninstalled);
    }

    #[test]
    fn test_concurrent_render_threads_clean_up_once() {
        let harness = Harness::new();
        let lifecycle = harness.running();
        let running = Arc::new(AtomicBool::new(true));
        let forwarded = Arc::new(AtomicUsize::new(0));
        let renders: Vec<_> = (0..4)
            .map(|_| render_loop(lifecycle.context(), Arc::clone(&running), Arc::clone(&forwarded)))
            .collect();

        let report = lifecycle.stop();
        running.store(false, Ordering::SeqCst);
        for render in renders {
            render.join().unwrap();
        }

        assert_eq!(report.cleanup, CleanupOutcome::Completed);
        assert_eq!(harness.cleanups(), 1);
    }

    #[test]
    fn test_stop_times_out_without_render_thread() {
        let harness = Harness::new();
        let config = HudConfig::builder()
            .cleanup_timeout(Duration::from_millis(30))
            .cleanup_poll(Duration::from_millis(1))
            .unhook_grace(Duration::ZERO)
            .build();
        let lifecycle = harness.running_with(config, false, false, None);
        let ctx = lifecycle.context();

        let report = lifecycle.stop();
        assert_eq!(report.cleanup, CleanupOutcome::TimedOut);
        assert_eq!(report.final_state, InterceptionState::Uninstalled);
        assert!(!report.is_clean());
        assert!(harness.log.events().contains(&"disable"));

        // A straggling frame must not run cleanup after teardown
        assert_eq!(ctx.on_frame(FrameHandle(0xDC), |original| original), ORIGINAL);
        assert_eq!(harness.cleanups(), 0);
    }

    #[test]
    fn test_stop_times_out_while_frame_is_stuck() {
        let harness = Harness::new();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let config = HudConfig::builder()
            .cleanup_timeout(Duration::from_millis(50))
            .cleanup_poll(Duration::from_millis(1))
            .unhook_grace(Duration::ZERO)
            .build();
        let lifecycle = harness.running_with(config, false, false, Some((entered_tx, release_rx)));
        let ctx = lifecycle.context();

        let running = Arc::new(AtomicBool::new(true));
        let forwarded = Arc::new(AtomicUsize::new(0));
        let render = render_loop(Arc::clone(&ctx), Arc::clone(&running), Arc::clone(&forwarded));
        entered_rx.recv().unwrap();

        // The frame never returns while stop runs; stop must not wait on it
        let started = Instant::now();
        let report = lifecycle.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(report.cleanup, CleanupOutcome::TimedOut);
        assert_eq!(report.final_state, InterceptionState::Uninstalled);

        release_tx.send(()).unwrap();
        running.store(false, Ordering::SeqCst);
        render.join().unwrap();

        assert_eq!(harness.cleanups(), 0);
        assert!(forwarded.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_disable_failure_does_not_block_teardown() {
        let harness = Harness::new();
        let lifecycle = harness.running_with(Harness::config(), false, true, None);
        let running = Arc::new(AtomicBool::new(true));
        let forwarded = Arc::new(AtomicUsize::new(0));
        let render = render_loop(lifecycle.context(), Arc::clone(&running), Arc::clone(&forwarded));

        let report = lifecycle.stop();
        running.store(false, Ordering::SeqCst);
        render.join().unwrap();

        assert!(report.disable_error.is_some());
        assert_eq!(report.cleanup, CleanupOutcome::Completed);
        assert_eq!(report.final_state, InterceptionState::Uninstalled);
    }

    #[test]
    fn test_stop_before_enable_cleans_up_inline() {
        let harness = Harness::new();
        let mut lifecycle =
            harness.lifecycle_with(Harness::game_memory(), Harness::config(), false, false, None);
        lifecycle
            .start(&builtin_signatures(), GameLayout::default(), DETOUR)
            .unwrap();

        let report = lifecycle.stop();
        assert_eq!(report.cleanup, CleanupOutcome::Completed);
        assert_eq!(report.final_state, InterceptionState::Uninstalled);
        assert_eq!(harness.cleanups(), 1);
        assert_eq!(harness.log.events(), vec!["install", "cleanup"]);
    }
}
