//! Exported entry points and the `SwapBuffers` detour.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use mhud::{
    CleanupOutcome, DetourContext, Error, FrameHandle, ImportTableHook, InterceptionLifecycle,
    MemoryReader, ProcessHandle,
};
use tracing::{error, info, warn};
use windows::Win32::Foundation::{BOOL, CloseHandle, HMODULE, TRUE};
use windows::Win32::Graphics::Gdi::HDC;
use windows::Win32::System::LibraryLoader::{FreeLibraryAndExitThread, GetModuleFileNameW};
use windows::Win32::System::SystemServices::DLL_PROCESS_ATTACH;
use windows::Win32::System::Threading::{CreateThread, THREAD_CREATION_FLAGS};

use crate::gdi::GdiPresenter;
use crate::teardown::TeardownGuard;
use crate::{logging, startup};

type Reader = Arc<MemoryReader>;
type Lifecycle = InterceptionLifecycle<ImportTableHook<Reader>, GdiPresenter, Reader>;
type Context = DetourContext<GdiPresenter, Reader>;
type SwapBuffersFn = unsafe extern "system" fn(HDC) -> BOOL;

static MODULE: AtomicUsize = AtomicUsize::new(0);
static CONTEXT: OnceLock<Arc<Context>> = OnceLock::new();
static LIFECYCLE: Mutex<Option<Lifecycle>> = Mutex::new(None);
static TEARDOWN: TeardownGuard = TeardownGuard::new();

#[unsafe(no_mangle)]
pub extern "system" fn DllMain(module: HMODULE, reason: u32, _reserved: *mut c_void) -> BOOL {
    if reason == DLL_PROCESS_ATTACH {
        MODULE.store(module.0 as usize, Ordering::Release);
    }
    TRUE
}

#[unsafe(no_mangle)]
pub extern "C" fn MHUD2_Start() {
    let dir = library_dir();
    logging::init(dir.as_deref());
    info!("MissingHUD2 injected and starting");

    if let Err(e) = start(dir.as_deref()) {
        error!("Error occurred during MHUD2 initialization: {}", e);
        if TEARDOWN.claim() {
            exit_thread(1);
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn MHUD2_Stop() {
    if !TEARDOWN.claim() {
        warn!("Stop already in progress on another thread");
        return;
    }
    info!("MissingHUD2 exiting");

    let lifecycle = lock(&LIFECYCLE).take();
    let code = match lifecycle {
        Some(lifecycle) => {
            let report = lifecycle.stop();
            match &report.cleanup {
                CleanupOutcome::Failed(e) => warn!("Cleanup reported an error: {}", e),
                CleanupOutcome::TimedOut => warn!("Render thread never ran cleanup"),
                _ => {}
            }
            info!(
                "Shutdown finished in state {} after {} frames",
                report.final_state, report.frames
            );
            if report.is_clean() { 0 } else { 1 }
        }
        None => {
            warn!("Stop requested with no running session");
            0
        }
    };

    exit_thread(code);
}

fn start(dir: Option<&Path>) -> mhud::Result<()> {
    let config = startup::load_config(dir);
    let (layout, signatures) = startup::load_overrides(&config)?;

    let process = ProcessHandle::current_module(&config.module_name)?;
    let reader = Arc::new(MemoryReader::new(process));
    let hook = ImportTableHook::new(Arc::clone(&reader));

    let mut lifecycle = InterceptionLifecycle::new(
        hook,
        reader,
        GdiPresenter::new(),
        config,
        Box::new(request_stop),
    );
    lifecycle.start(&signatures, layout, swap_buffers_detour as usize)?;

    CONTEXT
        .set(lifecycle.context())
        .map_err(|_| Error::Hook("MHUD2_Start called twice".to_string()))?;

    // Held through enable so a stop requested by the first frame waits for us
    let mut slot = lock(&LIFECYCLE);
    let lifecycle = slot.insert(lifecycle);
    if let Err(e) = lifecycle.enable() {
        if let Some(lifecycle) = slot.take() {
            let _ = lifecycle.stop();
        }
        return Err(e);
    }

    info!("SwapBuffers redirected, overlay running");
    Ok(())
}

extern "system" fn swap_buffers_detour(hdc: HDC) -> BOOL {
    let Some(context) = CONTEXT.get() else {
        return BOOL(0);
    };

    context.on_frame(FrameHandle(hdc.0 as usize), |original| {
        if original == 0 {
            return BOOL(0);
        }
        // SAFETY: `original` is the bound SwapBuffers entry read from the import table
        unsafe {
            let swap_buffers = std::mem::transmute::<usize, SwapBuffersFn>(original);
            swap_buffers(hdc)
        }
    })
}

/// Frame failures are reported on the render thread, which must keep
/// presenting. Stop ends with `FreeLibraryAndExitThread`, so it gets its own
/// OS thread.
fn request_stop() {
    // SAFETY: `stop_thread` matches the thread start routine signature
    let spawned = unsafe {
        CreateThread(
            None,
            0,
            Some(stop_thread),
            None,
            THREAD_CREATION_FLAGS(0),
            None,
        )
    };
    match spawned {
        // SAFETY: the handle is ours and not used again
        Ok(handle) => unsafe {
            let _ = CloseHandle(handle);
        },
        Err(e) => error!("Unable to start the stop thread: {}", e),
    }
}

unsafe extern "system" fn stop_thread(_parameter: *mut c_void) -> u32 {
    MHUD2_Stop();
    0
}

fn module_handle() -> HMODULE {
    HMODULE(MODULE.load(Ordering::Acquire) as *mut c_void)
}

fn library_dir() -> Option<PathBuf> {
    let mut buffer = [0u16; 1024];
    // SAFETY: the buffer outlives the call
    let len = unsafe { GetModuleFileNameW(module_handle(), &mut buffer) } as usize;
    if len == 0 || len >= buffer.len() {
        return None;
    }

    let path = PathBuf::from(String::from_utf16_lossy(&buffer[..len]));
    path.parent().map(Path::to_path_buf)
}

fn exit_thread(code: u32) -> ! {
    // SAFETY: drops the reference the injector's LoadLibrary took; nothing of
    // this library runs on this thread afterwards
    unsafe { FreeLibraryAndExitThread(module_handle(), code) }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
