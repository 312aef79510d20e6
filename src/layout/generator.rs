//! Placeholder chunk generation
//!
//! Materializes the ledger as a byte stream. Each entry is filled with its
//! own byte value so that distinct chunks stay distinguishable in the output,
//! except where samples are floats and only zeros are safe.

use std::io::Write;
use log::{debug, info};

use crate::compression::CompressionHandler;
use crate::layout::ledger::Ledger;
use crate::tiff::errors::TiffResult;
use crate::utils::progress::ProgressTracker;
use crate::utils::write_utils;

/// Fill byte for ledger entry `index`
///
/// Entry 0 is the header reservation and is zero. Otherwise the value is
/// `256 - index` with its bits reversed over its own bit length. Indices
/// past 256 wrap around to 1..=256.
pub fn fill_byte(index: usize) -> u8 {
    if index == 0 {
        return 0;
    }

    let mut remaining = 256 - ((index - 1) % 256 + 1);
    let mut value = 0usize;
    while remaining != 0 {
        value = value * 2 + (remaining & 1);
        remaining >>= 1;
    }
    value as u8
}

/// Writes a ledger out as placeholder bytes
pub struct ChunkGenerator<'a> {
    codec: &'a dyn CompressionHandler,
    show_progress: bool,
}

impl<'a> ChunkGenerator<'a> {
    pub fn new(codec: &'a dyn CompressionHandler) -> Self {
        ChunkGenerator { codec, show_progress: false }
    }

    /// Draw a progress bar while generating
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Writes every ledger entry in order
    ///
    /// # Returns
    /// The number of bytes written, equal to `ledger.end()`
    pub fn generate(&self, ledger: &Ledger, writer: &mut dyn Write) -> TiffResult<u64> {
        let progress = if self.show_progress {
            ProgressTracker::new(ledger.end(), "Generating placeholder chunks")
        } else {
            ProgressTracker::hidden()
        };

        let mut written = 0u64;
        for (index, entry) in ledger.entries().iter().enumerate() {
            let fill = if entry.all_zero { 0 } else { fill_byte(index) };

            match entry.uncompressed_length {
                Some(raw_len) => {
                    written += self.codec.write_fill(writer, raw_len, fill)?;
                },
                None => {
                    write_utils::write_repeated(writer, fill, entry.length)?;
                    written += entry.length;
                },
            }
            progress.increment(entry.length);
        }
        writer.flush()?;
        progress.finish();

        if written != ledger.end() {
            debug!("Generated {} bytes for a ledger of {} bytes", written, ledger.end());
        }
        info!("Generated {} placeholder bytes in {} blocks", written, ledger.len());
        Ok(written)
    }
}
