//! Process attachment: the injected library opens its own process, the CLI
//! opens the game from outside.

#[cfg(target_os = "windows")]
pub use windows_impl::ProcessHandle;

#[cfg(not(target_os = "windows"))]
pub use stub::ProcessHandle;

#[cfg(target_os = "windows")]
mod windows_impl {
    use std::ffi::c_void;
    use std::mem::size_of;

    use tracing::debug;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, Module32NextW,
        PROCESSENTRY32W, Process32FirstW, Process32NextW, TH32CS_SNAPMODULE,
        TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::System::Memory::{MEMORY_BASIC_INFORMATION, VirtualQuery};
    use windows::Win32::System::Threading::{
        GetCurrentProcess, GetCurrentProcessId, OpenProcess, PROCESS_QUERY_INFORMATION,
        PROCESS_VM_READ,
    };
    use windows::core::HSTRING;

    use crate::error::{Error, Result};

    pub struct ProcessHandle {
        handle: HANDLE,
        pub pid: u32,
        /// Allocation base of the game module
        pub base_address: u64,
        owned: bool,
    }

    // SAFETY: a process handle is a kernel object reference usable from any
    // thread; we never hand out mutable access to it.
    unsafe impl Send for ProcessHandle {}
    unsafe impl Sync for ProcessHandle {}

    impl ProcessHandle {
        /// Attach to the current process, resolving `module_name`'s allocation base.
        pub fn current_module(module_name: &str) -> Result<Self> {
            let name = HSTRING::from(module_name);

            // SAFETY: GetModuleHandleW does not take a reference on the module.
            let module = unsafe { GetModuleHandleW(&name) }.map_err(|e| {
                Error::ModuleResolution(format!("{} is not loaded: {}", module_name, e))
            })?;

            let mut info = MEMORY_BASIC_INFORMATION::default();
            // SAFETY: VirtualQuery only fills the struct we pass.
            let written = unsafe {
                VirtualQuery(
                    Some(module.0 as *const c_void),
                    &mut info,
                    size_of::<MEMORY_BASIC_INFORMATION>(),
                )
            };
            if written == 0 {
                return Err(Error::ModuleResolution(format!(
                    "Unable to get memory information for {}",
                    module_name
                )));
            }

            Ok(Self {
                // SAFETY: pseudo handle, valid for the lifetime of the process
                handle: unsafe { GetCurrentProcess() },
                // SAFETY: no preconditions
                pid: unsafe { GetCurrentProcessId() },
                base_address: info.AllocationBase as usize as u64,
                owned: false,
            })
        }

        /// Find a running process by executable name and open it for reading.
        pub fn find_and_open(process_name: &str) -> Result<Self> {
            let pid = find_process_id(process_name)?;

            // SAFETY: OpenProcess returns an owned handle that we close on drop.
            let handle = unsafe {
                OpenProcess(PROCESS_VM_READ | PROCESS_QUERY_INFORMATION, false, pid)
            }
            .map_err(|e| Error::ProcessOpenFailed(format!("pid {}: {}", pid, e)))?;

            let base_address = match find_module_base(pid, process_name) {
                Ok(base) => base,
                Err(e) => {
                    // SAFETY: handle was returned by OpenProcess above
                    let _ = unsafe { CloseHandle(handle) };
                    return Err(e);
                }
            };
            debug!("Opened {} (pid {}) base {:#x}", process_name, pid, base_address);

            Ok(Self {
                handle,
                pid,
                base_address,
                owned: true,
            })
        }

        pub(crate) fn raw_handle(&self) -> HANDLE {
            self.handle
        }
    }

    impl Drop for ProcessHandle {
        fn drop(&mut self) {
            if self.owned {
                // SAFETY: owned handles come from OpenProcess
                let _ = unsafe { CloseHandle(self.handle) };
            }
        }
    }

    fn wide_to_string(wide: &[u16]) -> String {
        let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
        String::from_utf16_lossy(&wide[..len])
    }

    fn find_process_id(process_name: &str) -> Result<u32> {
        // SAFETY: snapshot handle is closed before returning
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
            .map_err(|e| Error::ProcessNotFound(format!("snapshot failed: {}", e)))?;

        let mut entry = PROCESSENTRY32W {
            dwSize: size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        let mut found = None;
        // SAFETY: entry.dwSize is initialized as required by the API
        let mut ok = unsafe { Process32FirstW(snapshot, &mut entry) }.is_ok();
        while ok {
            if wide_to_string(&entry.szExeFile).eq_ignore_ascii_case(process_name) {
                found = Some(entry.th32ProcessID);
                break;
            }
            // SAFETY: same snapshot and entry as above
            ok = unsafe { Process32NextW(snapshot, &mut entry) }.is_ok();
        }

        // SAFETY: snapshot came from CreateToolhelp32Snapshot
        let _ = unsafe { CloseHandle(snapshot) };
        found.ok_or_else(|| Error::ProcessNotFound(process_name.to_string()))
    }

    fn find_module_base(pid: u32, module_name: &str) -> Result<u64> {
        // SAFETY: snapshot handle is closed before returning
        let snapshot =
            unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid) }
                .map_err(|e| Error::ModuleResolution(format!("module snapshot failed: {}", e)))?;

        let mut entry = MODULEENTRY32W {
            dwSize: size_of::<MODULEENTRY32W>() as u32,
            ..Default::default()
        };

        let mut found = None;
        // SAFETY: entry.dwSize is initialized as required by the API
        let mut ok = unsafe { Module32FirstW(snapshot, &mut entry) }.is_ok();
        while ok {
            if wide_to_string(&entry.szModule).eq_ignore_ascii_case(module_name) {
                found = Some(entry.modBaseAddr as usize as u64);
                break;
            }
            // SAFETY: same snapshot and entry as above
            ok = unsafe { Module32NextW(snapshot, &mut entry) }.is_ok();
        }

        // SAFETY: snapshot came from CreateToolhelp32Snapshot
        let _ = unsafe { CloseHandle(snapshot) };
        found.ok_or_else(|| {
            Error::ModuleResolution(format!("module {} not found in pid {}", module_name, pid))
        })
    }
}

#[cfg(not(target_os = "windows"))]
mod stub {
    use crate::error::{Error, Result};

    pub struct ProcessHandle {
        pub pid: u32,
        pub base_address: u64,
    }

    impl ProcessHandle {
        pub fn current_module(module_name: &str) -> Result<Self> {
            Err(Error::ModuleResolution(format!(
                "{}: module lookup is only supported on Windows",
                module_name
            )))
        }

        pub fn find_and_open(process_name: &str) -> Result<Self> {
            Err(Error::ProcessNotFound(format!(
                "{}: process attachment is only supported on Windows",
                process_name
            )))
        }
    }
}
