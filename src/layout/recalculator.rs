//! Layout recalculation
//!
//! Rewrites every pixel-bearing IFD so that its chunks describe synthetic
//! placeholder data: compression is forced to the placeholder codec, byte
//! counts are recomputed from the image geometry, and offsets point into the
//! placeholder stream described by the ledger.

use log::{debug, warn};

use crate::compression::CompressionHandler;
use crate::layout::ledger::{Ledger, LedgerEntry};
use crate::tiff::constants::{field_types, sample_format, tags, FLOAT_SOFTWARE_SIGNATURES};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::{Ifd, TagData};
use crate::tiff::registry::TagClassifier;
use crate::tiff::types::TiffStructure;

/// Chunk shape of a strip or tile IFD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGeometry {
    /// Tag holding the chunk offsets
    pub offsets_tag: u16,
    /// Tag holding the chunk byte counts
    pub counts_tag: u16,
    /// Chunk width in pixels
    pub width: u64,
    /// Height of every chunk but the last
    pub height: u64,
    /// Height of the last chunk
    pub final_height: u64,
    /// Sum of BitsPerSample over all samples
    pub bits_per_pixel: u64,
    /// Uncompressed bytes in every chunk but the last
    pub raw_len: u64,
    /// Uncompressed bytes in the last chunk
    pub final_raw_len: u64,
}

impl ChunkGeometry {
    /// Reads the chunk geometry of an IFD
    ///
    /// Tiles take precedence when an IFD carries both layouts.
    ///
    /// # Returns
    /// None for IFDs without pixel data, an error when a geometry tag is missing
    pub fn from_ifd(ifd: &Ifd) -> TiffResult<Option<Self>> {
        let (offsets_tag, counts_tag, width, height, final_height) = if ifd.has_tag(tags::TILE_OFFSETS) {
            let width = required_value(ifd, tags::TILE_WIDTH, "TileWidth")?;
            let height = required_value(ifd, tags::TILE_LENGTH, "TileLength")?;
            (tags::TILE_OFFSETS, tags::TILE_BYTE_COUNTS, width, height, height)
        } else if ifd.has_tag(tags::STRIP_OFFSETS) {
            let width = required_value(ifd, tags::IMAGE_WIDTH, "ImageWidth")?;
            let length = required_value(ifd, tags::IMAGE_LENGTH, "ImageLength")?;
            let rows = match ifd.first_value(tags::ROWS_PER_STRIP) {
                Some(rows) if rows > 0 => rows as u64,
                Some(rows) => return Err(TiffError::InvalidTagValue(
                    tags::ROWS_PER_STRIP, format!("RowsPerStrip must be positive, got {}", rows))),
                None => length,
            };
            let remainder = length % rows.max(1);
            let final_height = if remainder == 0 { rows } else { remainder };
            (tags::STRIP_OFFSETS, tags::STRIP_BYTE_COUNTS, width, rows, final_height)
        } else {
            return Ok(None);
        };

        if height == 0 {
            return Err(TiffError::InvalidTagValue(counts_tag, "Chunk height is zero".to_string()));
        }

        let bits_per_pixel: i64 = ifd.values(tags::BITS_PER_SAMPLE)
            .ok_or_else(|| TiffError::MissingGeometryTag(tags::BITS_PER_SAMPLE, "BitsPerSample".to_string()))?
            .iter()
            .sum();

        if !ifd.has_tag(counts_tag) {
            let name = if counts_tag == tags::TILE_BYTE_COUNTS { "TileByteCounts" } else { "StripByteCounts" };
            return Err(TiffError::MissingGeometryTag(counts_tag, name.to_string()));
        }

        let bits_per_pixel = bits_per_pixel.max(0) as u64;
        let overflow = || TiffError::InvalidTagValue(
            counts_tag,
            format!("Chunk of {}x{} pixels at {} bits per pixel overflows", width, height, bits_per_pixel),
        );
        let row_bytes = width.checked_mul(bits_per_pixel)
            .map(|bits| bits.div_ceil(8))
            .ok_or_else(overflow)?;
        let raw_len = row_bytes.checked_mul(height).ok_or_else(overflow)?;
        let final_raw_len = row_bytes.checked_mul(final_height).ok_or_else(overflow)?;

        Ok(Some(ChunkGeometry {
            offsets_tag,
            counts_tag,
            width,
            height,
            final_height,
            bits_per_pixel,
            raw_len,
            final_raw_len,
        }))
    }

    /// Whether the last chunk is shorter than the others
    pub fn is_irregular(&self) -> bool {
        self.final_height != self.height
    }
}

fn required_value(ifd: &Ifd, tag: u16, name: &str) -> TiffResult<u64> {
    match ifd.first_value(tag) {
        Some(value) if value >= 0 => Ok(value as u64),
        Some(value) => Err(TiffError::InvalidTagValue(tag, format!("{} is negative: {}", name, value))),
        None => Err(TiffError::MissingGeometryTag(tag, name.to_string())),
    }
}

/// Recomputes chunk layout for placeholder data
pub struct LayoutRecalculator<'a> {
    codec: &'a dyn CompressionHandler,
    classifier: &'a dyn TagClassifier,
}

impl<'a> LayoutRecalculator<'a> {
    pub fn new(codec: &'a dyn CompressionHandler, classifier: &'a dyn TagClassifier) -> Self {
        LayoutRecalculator { codec, classifier }
    }

    /// Recalculates a whole structure into a fresh ledger
    pub fn recalculate(&self, structure: &mut TiffStructure) -> TiffResult<Ledger> {
        let mut ledger = Ledger::new();
        self.adjust(&mut structure.ifds, &mut ledger)?;
        debug!("Layout uses {} ledger entries, {} bytes", ledger.len(), ledger.end());
        Ok(ledger)
    }

    /// Adjusts one IFD list, depth first, appending to `ledger`
    ///
    /// Float-sample detection is sticky within a list: once an IFD is found
    /// to hold float samples, later IFDs in the same list get zero chunks too.
    pub fn adjust(&self, ifds: &mut [Ifd], ledger: &mut Ledger) -> TiffResult<()> {
        let mut samples_float = false;

        for ifd in ifds.iter_mut() {
            self.place_auxiliary_block(ifd, ledger, samples_float);

            if let Some(geometry) = ChunkGeometry::from_ifd(ifd)? {
                samples_float = samples_float || has_float_samples(ifd);
                self.force_compression(ifd);
                self.place_chunks(ifd, &geometry, ledger, samples_float);
            }

            ifd.size = ledger.end();

            for record in ifd.tags.values_mut() {
                for chain in record.ifds.iter_mut() {
                    self.adjust(chain, ledger)?;
                }
            }
        }

        Ok(())
    }

    /// Reserves one block for byte-count tags other than the chunk counts
    ///
    /// The block is as long as the largest value any of them holds, and the
    /// matching offset tags are pointed at it.
    fn place_auxiliary_block(&self, ifd: &mut Ifd, ledger: &mut Ledger, samples_float: bool) {
        let aux_tags: Vec<u16> = ifd.tags.keys()
            .copied()
            .filter(|&tag| tag != tags::STRIP_BYTE_COUNTS && tag != tags::TILE_BYTE_COUNTS)
            .filter(|&tag| self.classifier.is_byte_count(tag))
            .collect();

        let max_len = aux_tags.iter()
            .filter_map(|&tag| ifd.get(tag).and_then(|record| record.data.max_integer()))
            .max()
            .unwrap_or(0);

        if max_len <= 0 {
            return;
        }

        let start = ledger.push(LedgerEntry::new(max_len as u64, None, samples_float));
        debug!("Auxiliary block of {} bytes at {} for tags {:?}", max_len, start, aux_tags);

        for tag in aux_tags {
            if let Some(partner) = self.classifier.offsets_tag_for(tag) {
                if let Some(record) = ifd.get_mut(partner) {
                    let count = record.data.len();
                    record.set_data(TagData::Integers(vec![start as i64; count]));
                }
            }
        }
    }

    fn force_compression(&self, ifd: &mut Ifd) {
        ifd.set_integers(tags::COMPRESSION, field_types::SHORT, vec![self.codec.code() as i64]);
    }

    fn place_chunks(&self, ifd: &mut Ifd, geometry: &ChunkGeometry, ledger: &mut Ledger, samples_float: bool) {
        let chunk_count = ifd.get(geometry.offsets_tag).map(|record| record.data.len()).unwrap_or(0);
        if chunk_count == 0 {
            warn!("Tag {} has no entries; no chunks placed", geometry.offsets_tag);
            return;
        }

        let declared_counts = ifd.get(geometry.counts_tag).map(|record| record.data.len()).unwrap_or(0);
        if declared_counts != chunk_count {
            warn!("Tag {} has {} entries but tag {} has {}; using {}",
                  geometry.offsets_tag, chunk_count, geometry.counts_tag, declared_counts, chunk_count);
        }

        let raw_len = geometry.raw_len;
        let stored_len = self.codec.encoded_len(raw_len);
        let entry_for = |raw: u64, stored: u64| {
            let uncompressed = if self.codec.is_encoding() { Some(raw) } else { None };
            LedgerEntry::new(stored, uncompressed, samples_float)
        };

        let mut offsets = vec![0u64; chunk_count];
        let mut counts = vec![stored_len; chunk_count];

        if geometry.is_irregular() {
            if chunk_count > 1 {
                let start = ledger.push(entry_for(raw_len, stored_len));
                offsets[..chunk_count - 1].iter_mut().for_each(|offset| *offset = start);
            }
            let final_raw = geometry.final_raw_len;
            let final_stored = self.codec.encoded_len(final_raw);
            offsets[chunk_count - 1] = ledger.push(entry_for(final_raw, final_stored));
            counts[chunk_count - 1] = final_stored;
        } else {
            let start = ledger.push(entry_for(raw_len, stored_len));
            offsets.iter_mut().for_each(|offset| *offset = start);
        }

        debug!("{} chunks of {} bytes ({} raw), final chunk {} bytes, float samples: {}",
               chunk_count, stored_len, raw_len, counts[chunk_count - 1], samples_float);

        if let Some(record) = ifd.get_mut(geometry.offsets_tag) {
            record.set_data(TagData::Integers(offsets.iter().map(|&v| v as i64).collect()));
        }
        if let Some(record) = ifd.get_mut(geometry.counts_tag) {
            record.set_data(TagData::Integers(counts.iter().map(|&v| v as i64).collect()));
        }
    }
}

/// Whether an IFD's samples must be written as zeros
///
/// True for a SampleFormat other than unsigned or signed integer, or, when
/// SampleFormat is absent, for software known to write float samples.
pub fn has_float_samples(ifd: &Ifd) -> bool {
    if ifd.has_tag(tags::SAMPLE_FORMAT) {
        return ifd.first_value(tags::SAMPLE_FORMAT)
            .map(|format| format != sample_format::UNSIGNED && format != sample_format::SIGNED)
            .unwrap_or(false);
    }

    ifd.text(tags::SOFTWARE)
        .map(|software| FLOAT_SOFTWARE_SIGNATURES.iter().any(|signature| software.contains(signature)))
        .unwrap_or(false)
}
