use std::sync::Arc;

use crate::error::{Error, Result};
use crate::memory::ProcessHandle;

/// Read access to a (possibly foreign) address space.
///
/// All values are little-endian. Implementations must fail rather than fault
/// when an address is unmapped.
pub trait ReadMemory {
    /// Base address of the module this reader was opened against
    fn base_address(&self) -> u64;

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    fn read_u8(&self, address: u64) -> Result<u8> {
        let bytes = self.read_bytes(address, 1)?;
        Ok(bytes[0])
    }

    fn read_u16(&self, address: u64) -> Result<u16> {
        let bytes = self.read_bytes(address, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        self.read_u32(address).map(|v| v as i32)
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        let bytes = self.read_bytes(address, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(buf))
    }

    fn read_f32(&self, address: u64) -> Result<f32> {
        self.read_u32(address).map(f32::from_bits)
    }

    /// Read a NUL-terminated ASCII string of at most `max_len` bytes
    fn read_cstring(&self, address: u64, max_len: usize) -> Result<String> {
        let mut out = Vec::new();
        for i in 0..max_len as u64 {
            let b = self.read_u8(address + i)?;
            if b == 0 {
                break;
            }
            out.push(b);
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// Write access, used only to patch import table slots.
pub trait WriteMemory {
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()>;

    fn write_u32(&self, address: u64, value: u32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    fn write_u64(&self, address: u64, value: u64) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }
}

impl<T: ReadMemory + ?Sized> ReadMemory for &T {
    fn base_address(&self) -> u64 {
        (**self).base_address()
    }

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, size)
    }
}

impl<T: ReadMemory + ?Sized> ReadMemory for Arc<T> {
    fn base_address(&self) -> u64 {
        (**self).base_address()
    }

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, size)
    }
}

impl<T: WriteMemory + ?Sized> WriteMemory for Arc<T> {
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(address, bytes)
    }
}

/// Memory reader backed by `ReadProcessMemory`.
///
/// Works for both the current process (injected) and a foreign one (CLI);
/// unmapped addresses surface as `Error::MemoryReadFailed` instead of an
/// access violation.
pub struct MemoryReader {
    process: ProcessHandle,
}

impl MemoryReader {
    pub fn new(process: ProcessHandle) -> Self {
        Self { process }
    }

    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }
}

#[cfg(target_os = "windows")]
impl ReadMemory for MemoryReader {
    fn base_address(&self) -> u64 {
        self.process.base_address
    }

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        use std::ffi::c_void;
        use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;

        if address == 0 {
            return Err(Error::MemoryReadFailed {
                address,
                message: "null address".to_string(),
            });
        }

        let mut buffer = vec![0u8; size];
        let mut bytes_read = 0usize;

        // SAFETY: ReadProcessMemory validates the source range and writes at
        // most `size` bytes into the buffer we own.
        unsafe {
            ReadProcessMemory(
                self.process.raw_handle(),
                address as usize as *const c_void,
                buffer.as_mut_ptr().cast(),
                size,
                Some(&mut bytes_read as *mut usize),
            )
        }
        .map_err(|e| Error::MemoryReadFailed {
            address,
            message: e.to_string(),
        })?;

        if bytes_read != size {
            return Err(Error::MemoryReadFailed {
                address,
                message: format!("short read: {} of {} bytes", bytes_read, size),
            });
        }

        Ok(buffer)
    }
}

#[cfg(target_os = "windows")]
impl WriteMemory for MemoryReader {
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
        use std::ffi::c_void;
        use windows::Win32::System::Diagnostics::Debug::WriteProcessMemory;
        use windows::Win32::System::Memory::{
            PAGE_PROTECTION_FLAGS, PAGE_READWRITE, VirtualProtectEx,
        };

        let handle = self.process.raw_handle();
        let target = address as usize as *const c_void;
        let mut old = PAGE_PROTECTION_FLAGS::default();

        // SAFETY: the range belongs to the module's import table; protection
        // is restored after the write.
        unsafe {
            VirtualProtectEx(handle, target, bytes.len(), PAGE_READWRITE, &mut old).map_err(
                |e| Error::MemoryWriteFailed {
                    address,
                    message: format!("VirtualProtectEx: {}", e),
                },
            )?;

            let written = WriteProcessMemory(handle, target, bytes.as_ptr().cast(), bytes.len(), None);

            let mut ignored = PAGE_PROTECTION_FLAGS::default();
            let _ = VirtualProtectEx(handle, target, bytes.len(), old, &mut ignored);

            written.map_err(|e| Error::MemoryWriteFailed {
                address,
                message: e.to_string(),
            })
        }
    }
}

#[cfg(not(target_os = "windows"))]
impl ReadMemory for MemoryReader {
    fn base_address(&self) -> u64 {
        self.process.base_address
    }

    fn read_bytes(&self, address: u64, _size: usize) -> Result<Vec<u8>> {
        Err(Error::MemoryReadFailed {
            address,
            message: "process memory access is only supported on Windows".to_string(),
        })
    }
}

#[cfg(not(target_os = "windows"))]
impl WriteMemory for MemoryReader {
    fn write_bytes(&self, address: u64, _bytes: &[u8]) -> Result<()> {
        Err(Error::MemoryWriteFailed {
            address,
            message: "process memory access is only supported on Windows".to_string(),
        })
    }
}
