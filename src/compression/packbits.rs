//! PackBits run-length handler (compression code 32773)
//!
//! Placeholder chunks are a single repeated byte, so they are always stored
//! as repeat runs: `0x81 fill` expands to 128 copies of `fill`, and a final
//! partial run of `r` bytes is written as `(257 - r) fill`.

use std::io::Write;
use log::trace;

use crate::tiff::constants::compression;
use crate::tiff::errors::{TiffError, TiffResult};
use super::handler::CompressionHandler;

/// Longest run a single PackBits repeat header can describe
const MAX_RUN: u64 = 128;

/// Source bytes encoded per buffered write
const SOURCE_BLOCK: u64 = 65536 * MAX_RUN;

/// PackBits handler
pub struct PackBitsHandler;

impl PackBitsHandler {
    /// Header byte for a repeat run of `run` copies (1..=128)
    ///
    /// A run of one wraps to `0x00`, which PackBits reads as a one-byte
    /// literal; the encoded length is the same two bytes either way.
    pub fn run_header(run: u64) -> u8 {
        (257 - run) as u8
    }
}

impl CompressionHandler for PackBitsHandler {
    fn decompress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let mut output = Vec::with_capacity(data.len() * 2);
        let mut pos = 0;

        while pos < data.len() {
            let header = data[pos] as i8;
            pos += 1;

            if header >= 0 {
                let literal = header as usize + 1;
                let end = pos + literal;
                if end > data.len() {
                    return Err(TiffError::GenericError(format!(
                        "PackBits literal run of {} bytes overruns the chunk at {}", literal, pos)));
                }
                output.extend_from_slice(&data[pos..end]);
                pos = end;
            } else if header != -128 {
                let repeat = 1 - header as i32;
                let value = *data.get(pos).ok_or_else(|| TiffError::GenericError(
                    "PackBits repeat run without a value byte".to_string()))?;
                pos += 1;
                output.extend(std::iter::repeat(value).take(repeat as usize));
            }
        }

        trace!("PackBits decoded {} bytes into {}", data.len(), output.len());
        Ok(output)
    }

    fn encoded_len(&self, raw_len: u64) -> u64 {
        raw_len.div_ceil(MAX_RUN) * 2
    }

    fn write_fill(&self, writer: &mut dyn Write, raw_len: u64, fill: u8) -> TiffResult<u64> {
        let mut written = 0;
        let mut pos = 0;

        while pos < raw_len {
            let block = SOURCE_BLOCK.min(raw_len - pos);
            let full_runs = block / MAX_RUN;
            let remainder = block - full_runs * MAX_RUN;

            let mut rle = Vec::with_capacity((full_runs as usize + 1) * 2);
            for _ in 0..full_runs {
                rle.push(Self::run_header(MAX_RUN));
                rle.push(fill);
            }
            if remainder > 0 {
                rle.push(Self::run_header(remainder));
                rle.push(fill);
            }

            writer.write_all(&rle)?;
            written += rle.len() as u64;
            pos += block;
        }

        Ok(written)
    }

    fn name(&self) -> &'static str {
        "PackBits"
    }

    fn code(&self) -> u64 {
        compression::PACKBITS as u64
    }

    fn is_encoding(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_length_law() {
        let handler = PackBitsHandler;
        for raw in [0u64, 1, 127, 128, 129, 1000, 65536 * 128 + 5] {
            std::assert_eq!(handler.encoded_len(raw), (raw + 127) / 128 * 2);
        }
    }

    #[test]
    fn test_fill_matches_encoded_length() {
        let handler = PackBitsHandler;
        let mut out = Vec::new();
        let written = handler.write_fill(&mut out, 300, 0x7f).unwrap();

        std::assert_eq!(written, 6);
        std::assert_eq!(out, vec![0x81, 0x7f, 0x81, 0x7f, 0xd5, 0x7f]);
        std::assert_eq!(written, handler.encoded_len(300));
    }

    #[test]
    fn test_final_run_byte() {
        // 257 - 44 = 213
        std::assert_eq!(PackBitsHandler::run_header(44), 213);
        std::assert_eq!(PackBitsHandler::run_header(128), 0x81);
        std::assert_eq!(PackBitsHandler::run_header(1), 0);
    }

    #[test]
    fn test_fill_decodes_to_source() {
        let handler = PackBitsHandler;
        for raw in [1u64, 2, 128, 129, 1000] {
            let mut out = Vec::new();
            handler.write_fill(&mut out, raw, 0xaa).unwrap();
            let decoded = handler.decompress(&out).unwrap();
            std::assert_eq!(decoded.len() as u64, raw);
            std::assert!(decoded.iter().all(|&b| b == 0xaa));
        }
    }

    #[test]
    fn test_decompress_literal_and_noop() {
        let handler = PackBitsHandler;
        let data = [0x02, 1, 2, 3, 0x80, 0xfe, 9];
        std::assert_eq!(handler.decompress(&data).unwrap(), vec![1, 2, 3, 9, 9, 9]);
    }

    #[test]
    fn test_decompress_truncated_literal() {
        let handler = PackBitsHandler;
        std::assert!(handler.decompress(&[0x05, 1, 2]).is_err());
    }
}
