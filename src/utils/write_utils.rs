//! TIFF writing utilities
//!
//! Helper functions for writing TIFF files to disk, handling alignment,
//! padding and block-wise filler output.

use crate::tiff::errors::TiffResult;
use std::io::Write;

/// Size of the blocks filler data is written in
pub const WRITE_BLOCK: u64 = 65536;

/// Align an offset to a 4-byte boundary
///
/// TIFF specification recommends aligning data on word boundaries.
/// This function returns the next 4-byte aligned position given a current offset.
pub fn align_to_4_bytes(offset: u64) -> u64 {
    let remainder = offset % 4;
    if remainder == 0 {
        offset
    } else {
        offset + (4 - remainder)
    }
}

/// Writes zero bytes to move a writer from `position` up to `target`
pub fn pad_to(writer: &mut dyn Write, position: u64, target: u64) -> TiffResult<()> {
    if target > position {
        write_repeated(writer, 0, target - position)?;
    }
    Ok(())
}

/// Writes `count` copies of `value` in 64 KiB blocks
pub fn write_repeated(writer: &mut dyn Write, value: u8, count: u64) -> TiffResult<()> {
    let block = vec![value; WRITE_BLOCK.min(count) as usize];
    let mut remaining = count;
    while remaining > 0 {
        let len = WRITE_BLOCK.min(remaining) as usize;
        writer.write_all(&block[..len])?;
        remaining -= len as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment() {
        std::assert_eq!(align_to_4_bytes(8), 8);
        std::assert_eq!(align_to_4_bytes(9), 12);
    }

    #[test]
    fn test_write_repeated_spans_blocks() {
        let mut out = Vec::new();
        write_repeated(&mut out, 7, WRITE_BLOCK + 3).unwrap();
        std::assert_eq!(out.len() as u64, WRITE_BLOCK + 3);
        std::assert!(out.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_pad_to() {
        let mut out = vec![1u8; 5];
        pad_to(&mut out, 5, 8).unwrap();
        std::assert_eq!(out, vec![1, 1, 1, 1, 1, 0, 0, 0]);
        pad_to(&mut out, 8, 8).unwrap();
        std::assert_eq!(out.len(), 8);
    }
}
