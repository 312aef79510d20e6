//! Handler for uncompressed data

use std::io::Write;

use crate::tiff::constants::compression;
use crate::tiff::errors::TiffResult;
use crate::utils::write_utils;
use super::handler::CompressionHandler;

/// Uncompressed data handler (compression code 1)
pub struct UncompressedHandler;

impl CompressionHandler for UncompressedHandler {
    fn decompress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn encoded_len(&self, raw_len: u64) -> u64 {
        raw_len
    }

    fn write_fill(&self, writer: &mut dyn Write, raw_len: u64, fill: u8) -> TiffResult<u64> {
        write_utils::write_repeated(writer, fill, raw_len)?;
        Ok(raw_len)
    }

    fn name(&self) -> &'static str {
        "Uncompressed"
    }

    fn code(&self) -> u64 {
        compression::NONE as u64
    }
}
