//! Compression handler trait definition

use std::io::Write;

use crate::tiff::errors::TiffResult;

/// Strategy trait for the placeholder compression schemes
///
/// A handler knows how long a chunk of placeholder data becomes once stored,
/// how to emit a chunk that consists of a single repeated byte, and how to
/// turn stored bytes back into pixels.
pub trait CompressionHandler: Send + Sync {
    /// Decompress the data
    fn decompress(&self, data: &[u8]) -> TiffResult<Vec<u8>>;

    /// Stored length of a chunk holding `raw_len` source bytes
    fn encoded_len(&self, raw_len: u64) -> u64;

    /// Writes `raw_len` source bytes of `fill` in stored form
    ///
    /// # Returns
    /// The number of bytes written
    fn write_fill(&self, writer: &mut dyn Write, raw_len: u64, fill: u8) -> TiffResult<u64>;

    /// Get the name of this compression method
    fn name(&self) -> &'static str;

    /// Get the compression code
    fn code(&self) -> u64;

    /// Whether stored chunks differ from their source bytes
    fn is_encoding(&self) -> bool {
        false
    }
}
