//! Test doubles for memory access.

use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::memory::{ReadMemory, WriteMemory};

/// Flat little-endian memory image starting at `base`.
pub struct MockMemoryReader {
    base: u64,
    data: Mutex<Vec<u8>>,
}

impl MockMemoryReader {
    fn range(&self, address: u64, size: usize, len: usize) -> Option<std::ops::Range<usize>> {
        let start = address.checked_sub(self.base)? as usize;
        let end = start.checked_add(size)?;
        (end <= len).then_some(start..end)
    }
}

impl ReadMemory for MockMemoryReader {
    fn base_address(&self) -> u64 {
        self.base
    }

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let data = self.data.lock().unwrap();
        match self.range(address, size, data.len()) {
            Some(range) => Ok(data[range].to_vec()),
            None => Err(Error::MemoryReadFailed {
                address,
                message: format!("{} bytes outside mock image", size),
            }),
        }
    }
}

impl WriteMemory for MockMemoryReader {
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        let len = data.len();
        match self.range(address, bytes.len(), len) {
            Some(range) => {
                data[range].copy_from_slice(bytes);
                Ok(())
            }
            None => Err(Error::MemoryWriteFailed {
                address,
                message: format!("{} bytes outside mock image", bytes.len()),
            }),
        }
    }
}

pub struct MockMemoryBuilder {
    base: u64,
    data: Vec<u8>,
}

impl MockMemoryBuilder {
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    pub fn write_bytes(mut self, address: u64, bytes: &[u8]) -> Self {
        let start = (address - self.base) as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn write_u8(self, address: u64, value: u8) -> Self {
        self.write_bytes(address, &[value])
    }

    pub fn write_u32(self, address: u64, value: u32) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_i32(self, address: u64, value: i32) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_f32(self, address: u64, value: f32) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn build(self) -> MockMemoryReader {
        MockMemoryReader {
            base: self.base,
            data: Mutex::new(self.data),
        }
    }
}

/// Minimal PE32 image: DOS header, NT headers and an import directory.
pub struct PeImageBuilder {
    size: usize,
    imports: Vec<(String, String, u32)>,
    patches: Vec<(usize, Vec<u8>)>,
}

/// A built image plus the RVA of each import's IAT slot, in `import` order.
pub struct PeImage {
    pub bytes: Vec<u8>,
    pub slot_rvas: Vec<u32>,
}

pub const E_LFANEW: usize = 0x80;
const OPTIONAL_HEADER: usize = E_LFANEW + 24;
const IMPORT_DESCRIPTORS: usize = 0x200;
const IMPORT_DATA: usize = 0x300;

impl PeImageBuilder {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            imports: Vec::new(),
            patches: Vec::new(),
        }
    }

    pub fn import(mut self, library: &str, symbol: &str, original: u32) -> Self {
        self.imports
            .push((library.to_string(), symbol.to_string(), original));
        self
    }

    /// Place raw bytes at an image offset (past the import data)
    pub fn bytes_at(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.patches.push((offset, bytes.to_vec()));
        self
    }

    pub fn build(self) -> PeImage {
        let mut img = vec![0u8; self.size];
        let put = |img: &mut Vec<u8>, at: usize, bytes: &[u8]| {
            img[at..at + bytes.len()].copy_from_slice(bytes);
        };

        put(&mut img, 0, b"MZ");
        put(&mut img, 0x3C, &(E_LFANEW as u32).to_le_bytes());
        put(&mut img, E_LFANEW, b"PE\0\0");
        put(&mut img, E_LFANEW + 4, &0x014Cu16.to_le_bytes());
        put(&mut img, E_LFANEW + 20, &0x00E0u16.to_le_bytes());
        put(&mut img, OPTIONAL_HEADER, &0x010Bu16.to_le_bytes());
        put(&mut img, OPTIONAL_HEADER + 56, &(self.size as u32).to_le_bytes());
        put(&mut img, OPTIONAL_HEADER + 92, &16u32.to_le_bytes());

        let descriptors_len = (self.imports.len() + 1) * 20;
        put(
            &mut img,
            OPTIONAL_HEADER + 104,
            &(IMPORT_DESCRIPTORS as u32).to_le_bytes(),
        );
        put(
            &mut img,
            OPTIONAL_HEADER + 108,
            &(descriptors_len as u32).to_le_bytes(),
        );

        let mut cursor = IMPORT_DATA;
        let mut slot_rvas = Vec::new();
        for (i, (library, symbol, original)) in self.imports.iter().enumerate() {
            let name_rva = cursor;
            put(&mut img, cursor, library.as_bytes());
            cursor = align4(cursor + library.len() + 1);

            let hint_name_rva = cursor;
            put(&mut img, cursor + 2, symbol.as_bytes());
            cursor = align4(cursor + 2 + symbol.len() + 1);

            let ilt_rva = cursor;
            put(&mut img, cursor, &(hint_name_rva as u32).to_le_bytes());
            cursor += 8;

            let iat_rva = cursor;
            put(&mut img, cursor, &original.to_le_bytes());
            cursor += 8;
            slot_rvas.push(iat_rva as u32);

            let desc = IMPORT_DESCRIPTORS + i * 20;
            put(&mut img, desc, &(ilt_rva as u32).to_le_bytes());
            put(&mut img, desc + 12, &(name_rva as u32).to_le_bytes());
            put(&mut img, desc + 16, &(iat_rva as u32).to_le_bytes());
        }

        for (offset, bytes) in &self.patches {
            put(&mut img, *offset, bytes);
        }

        PeImage {
            bytes: img,
            slot_rvas,
        }
    }
}

fn align4(v: usize) -> usize {
    (v + 3) & !3
}

/// Code matched by the `playerManager` signature, loading from `slot`
pub fn manager_code(slot: u32) -> Vec<u8> {
    let mut code = vec![0xA1];
    code.extend_from_slice(&slot.to_le_bytes());
    code.extend_from_slice(&[
        0x8B, 0x88, 0x10, 0x00, 0x00, 0x00, 0x85, 0xC9, 0x74, 0x05, 0x8B, 0x01,
    ]);
    code
}

/// Code matched by the `playerList` signature for the manager at `slot`
pub fn list_code(slot: u32, list_offset: u16) -> Vec<u8> {
    let mut code = vec![0x8B, 0x35];
    code.extend_from_slice(&slot.to_le_bytes());
    code.extend_from_slice(&[0x8B, 0x86]);
    code.extend_from_slice(&list_offset.to_le_bytes());
    code.extend_from_slice(&[0x00, 0x00, 0x2B, 0x86]);
    code.extend_from_slice(&(list_offset + 4).to_le_bytes());
    code.extend_from_slice(&[0x00, 0x00, 0xC1, 0xF8, 0x02]);
    code
}

/// Game image with both builtin signatures and a `gdi32.dll!SwapBuffers`
/// import bound to `original`.
pub fn game_image(slot: u32, list_offset: u16, original: u32) -> PeImage {
    PeImageBuilder::new(0x1000)
        .import("gdi32.dll", "SwapBuffers", original)
        .bytes_at(0x600, &manager_code(slot))
        .bytes_at(0x680, &list_code(slot, list_offset))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_read_out_of_bounds() {
        let reader = MockMemoryBuilder::new(0x1000, 4).build();
        assert!(reader.read_bytes(0x1002, 4).is_err());
        assert!(reader.read_bytes(0x0FFF, 1).is_err());
        assert!(reader.read_bytes(0x1000, 4).is_ok());
    }

    #[test]
    fn test_mock_write_is_visible() {
        let reader = MockMemoryBuilder::new(0x1000, 8).build();
        reader.write_u32(0x1004, 0xDEAD_BEEF).unwrap();
        assert_eq!(reader.read_u32(0x1004).unwrap(), 0xDEAD_BEEF);
        assert!(reader.write_u32(0x1006, 1).is_err());
    }

    #[test]
    fn test_pe_image_layout() {
        let image = PeImageBuilder::new(0x1000)
            .import("gdi32.dll", "SwapBuffers", 0x7700_1000)
            .build();
        assert_eq!(&image.bytes[0..2], b"MZ");
        assert_eq!(&image.bytes[E_LFANEW..E_LFANEW + 4], b"PE\0\0");
        let slot = image.slot_rvas[0] as usize;
        assert_eq!(
            u32::from_le_bytes(image.bytes[slot..slot + 4].try_into().unwrap()),
            0x7700_1000
        );
    }
}
