//! Wildcard/capture scanning over a module image.

use tracing::debug;

use crate::memory::ReadMemory;
use crate::offset::{MemorySignature, SigByte};

/// Bytes fetched per read while scanning a region
pub const SCAN_CHUNK_SIZE: usize = 1024 * 1024;

/// Scans a region of a reader's address space for a signature.
///
/// The output of a scan is the concatenation of the captured bytes of every
/// full match, in region order. Callers that expect one match take the first
/// `capture_count()` bytes.
pub struct SignatureScanner<'a, R: ReadMemory + ?Sized> {
    reader: &'a R,
    chunk_size: usize,
}

impl<'a, R: ReadMemory + ?Sized> SignatureScanner<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self {
            reader,
            chunk_size: SCAN_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Scan `[region_start, region_start + region_len)`.
    ///
    /// A failed read ends the scan; whatever was captured before it is returned.
    pub fn scan(&self, region_start: u64, region_len: usize, signature: &MemorySignature) -> Vec<u8> {
        let mut captured = Vec::new();
        if signature.is_empty() || region_len < signature.len() {
            return captured;
        }

        let keep = signature.len() - 1;
        let mut tail: Vec<u8> = Vec::new();
        let mut offset = 0usize;

        while offset < region_len {
            let read_size = (region_len - offset).min(self.chunk_size);
            let addr = region_start + offset as u64;

            let chunk = match self.reader.read_bytes(addr, read_size) {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(
                        "Signature scan stopped at {:#x} (scanned {:#x} bytes): {}",
                        addr, offset, e
                    );
                    break;
                }
            };

            let mut data = Vec::with_capacity(tail.len() + chunk.len());
            data.extend_from_slice(&tail);
            data.extend_from_slice(&chunk);

            captured.extend(scan_slice(&data, signature));

            // A match starting in the tail could not complete in the previous
            // window, so carrying `len - 1` bytes never reports a match twice.
            tail = if data.len() > keep {
                data[data.len() - keep..].to_vec()
            } else {
                data
            };

            offset += read_size;
        }

        captured
    }
}

/// Scan an in-memory buffer. Same semantics as [`SignatureScanner::scan`].
pub fn scan_slice(haystack: &[u8], signature: &MemorySignature) -> Vec<u8> {
    let pattern = signature.positions();
    let mut captured = Vec::new();
    if pattern.is_empty() || haystack.len() < pattern.len() {
        return captured;
    }

    let last = haystack.len() - pattern.len();
    match pattern[0] {
        SigByte::Literal(first) => {
            for start in memchr::memchr_iter(first, &haystack[..=last]) {
                capture_at(haystack, start, pattern, &mut captured);
            }
        }
        _ => {
            for start in 0..=last {
                capture_at(haystack, start, pattern, &mut captured);
            }
        }
    }

    captured
}

fn capture_at(haystack: &[u8], start: usize, pattern: &[SigByte], out: &mut Vec<u8>) {
    let window = &haystack[start..start + pattern.len()];

    for (byte, sig) in window.iter().zip(pattern) {
        if let SigByte::Literal(value) = sig
            && byte != value
        {
            return;
        }
    }

    out.extend(
        window
            .iter()
            .zip(pattern)
            .filter(|(_, sig)| matches!(sig, SigByte::Capture))
            .map(|(byte, _)| *byte),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MockMemoryBuilder;

    fn sig(pattern: &str) -> MemorySignature {
        MemorySignature::parse(pattern).unwrap()
    }

    #[test]
    fn test_single_match_returns_captures_in_order() {
        let haystack = [0x90, 0xA1, 0x10, 0x20, 0x30, 0x40, 0x8B, 0x90];
        let out = scan_slice(&haystack, &sig("A1 vv vv vv vv 8B"));
        assert_eq!(out, vec![0x10, 0x20, 0x30, 0x40]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let haystack = [0x90; 64];
        assert!(scan_slice(&haystack, &sig("A1 vv 8B")).is_empty());
        assert!(scan_slice(&[0xA1], &sig("A1 vv 8B")).is_empty());
    }

    #[test]
    fn test_partial_match_contributes_nothing() {
        // Captures before the failing literal must not leak into the output
        let haystack = [0xA1, 0x11, 0x22, 0x00, 0xA1, 0x33, 0x44, 0x8B];
        let out = scan_slice(&haystack, &sig("A1 vv vv 8B"));
        assert_eq!(out, vec![0x33, 0x44]);
    }

    #[test]
    fn test_multiple_matches_concatenate() {
        let haystack = [0xA1, 0x01, 0x8B, 0xA1, 0x02, 0x8B];
        let out = scan_slice(&haystack, &sig("A1 vv 8B"));
        assert_eq!(out, vec![0x01, 0x02]);
    }

    #[test]
    fn test_leading_wildcard_scans_every_offset() {
        let haystack = [0x00, 0x55, 0xC3, 0x77, 0x55, 0xC3];
        let out = scan_slice(&haystack, &sig("vv 55 C3"));
        assert_eq!(out, vec![0x00, 0x77]);
    }

    #[test]
    fn test_match_at_last_offset() {
        let haystack = [0x00, 0x00, 0xA1, 0x7F];
        assert_eq!(scan_slice(&haystack, &sig("A1 vv")), vec![0x7F]);
    }

    #[test]
    fn test_region_scan_across_chunk_boundary() {
        let base = 0x40_0000;
        let reader = MockMemoryBuilder::new(base, 0x40)
            .write_bytes(base + 0x0E, &[0xA1, 0xEF, 0xBE, 0x8B])
            .build();

        let out = SignatureScanner::new(&reader)
            .with_chunk_size(0x10)
            .scan(base, 0x40, &sig("A1 vv vv 8B"));
        assert_eq!(out, vec![0xEF, 0xBE]);
    }

    #[test]
    fn test_region_scan_does_not_duplicate_matches() {
        let base = 0x1000;
        let reader = MockMemoryBuilder::new(base, 0x20)
            .write_bytes(base + 0x08, &[0xA1, 0x01, 0x8B])
            .write_bytes(base + 0x0F, &[0xA1, 0x02, 0x8B])
            .build();

        for chunk in [1, 3, 4, 0x10, 0x100] {
            let out = SignatureScanner::new(&reader)
                .with_chunk_size(chunk)
                .scan(base, 0x20, &sig("A1 vv 8B"));
            assert_eq!(out, vec![0x01, 0x02], "chunk size {}", chunk);
        }
    }

    #[test]
    fn test_region_scan_stops_at_unreadable_memory() {
        let base = 0x1000;
        let reader = MockMemoryBuilder::new(base, 0x10)
            .write_bytes(base + 0x2, &[0xA1, 0x09, 0x8B])
            .build();

        // Region extends past the mapped image
        let out = SignatureScanner::new(&reader)
            .with_chunk_size(0x10)
            .scan(base, 0x100, &sig("A1 vv 8B"));
        assert_eq!(out, vec![0x09]);
    }
}
