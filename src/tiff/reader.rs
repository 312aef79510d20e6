//! TIFF file reader implementation
//!
//! Loads a TIFF or BigTIFF file back into the tag tree, decoding every tag
//! value and following IFD-valued tags into their nested chains. Offset
//! tags keep the file positions they hold, so the loaded tree can be
//! written again with the file itself as the chunk source.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use crate::io::seekable::SeekableReader;
use crate::io::byte_order::ByteOrderHandler;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::{Ifd, TagRecord};
use crate::tiff::registry::{is_ifd_datatype, TagClassifier};
use crate::tiff::types::TiffStructure;
use crate::tiff::validation;
use crate::utils::format_utils;
use crate::utils::tag_utils;

/// Upper bound on IFDs in one chain
const MAX_CHAIN_LENGTH: usize = 100_000;

/// Raw directory entry before its value is decoded
struct RawEntry {
    tag: u16,
    field_type: u16,
    count: u64,
    field: [u8; 8],
}

/// State shared while walking one file
struct ReadContext {
    handler: Box<dyn ByteOrderHandler>,
    big_tiff: bool,
    file_size: u64,
    visited: HashSet<u64>,
}

/// Reader for TIFF and BigTIFF files
pub struct TiffReader<'a> {
    classifier: &'a dyn TagClassifier,
}

impl<'a> TiffReader<'a> {
    /// Creates a new TIFF reader
    pub fn new(classifier: &'a dyn TagClassifier) -> Self {
        TiffReader { classifier }
    }

    /// Loads a TIFF file from the given path
    pub fn load(&self, path: &Path) -> TiffResult<TiffStructure> {
        info!("Loading TIFF file: {}", path.display());
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(1024 * 1024, file);
        self.read(&mut reader)
    }

    /// Reads a TIFF file from the given reader
    ///
    /// Detects the byte order and format, then walks the top-level IFD chain
    /// and every sub-IFD chain it points at. An offset seen twice ends the
    /// chain it appears in.
    pub fn read(&self, reader: &mut dyn SeekableReader) -> TiffResult<TiffStructure> {
        reader.seek(SeekFrom::Start(0))?;
        let byte_order = format_utils::detect_byte_order(reader)?;
        let handler = byte_order.create_handler();
        let (big_tiff, _) = format_utils::detect_tiff_format(reader, handler.as_ref())?;
        let first_offset = format_utils::read_offset(reader, big_tiff, handler.as_ref())?;
        debug!("First IFD offset: {}", first_offset);

        let file_size = validation::get_file_size(reader)?;
        let mut context = ReadContext {
            handler,
            big_tiff,
            file_size,
            visited: HashSet::new(),
        };

        let mut tiff = TiffStructure::new(byte_order.is_big_endian(), big_tiff);
        tiff.ifds = self.read_chain(reader, &mut context, first_offset)?;

        info!("Read {} IFDs ({} including sub-IFDs)", tiff.ifd_count(), tiff.total_ifd_count());
        Ok(tiff)
    }

    /// Reads a chain of IFDs linked by next-IFD offsets
    fn read_chain(&self, reader: &mut dyn SeekableReader, context: &mut ReadContext, first_offset: u64) -> TiffResult<Vec<Ifd>> {
        let mut ifds = Vec::new();
        let mut offset = first_offset;

        while offset != 0 && ifds.len() < MAX_CHAIN_LENGTH {
            if let Err(e) = validation::validate_ifd_offset(offset, context.file_size) {
                warn!("{}; stopping IFD chain", e);
                break;
            }
            if !context.visited.insert(offset) {
                warn!("IFD offset {} already visited; stopping IFD chain", offset);
                break;
            }

            let (ifd, next) = self.read_ifd(reader, context, offset)?;
            debug!("Read IFD at {} with {} tags, next at {}", offset, ifd.entry_count(), next);
            ifds.push(ifd);
            offset = next;
        }

        Ok(ifds)
    }

    /// Reads one IFD and returns it with the offset of the next one
    fn read_ifd(&self, reader: &mut dyn SeekableReader, context: &mut ReadContext, offset: u64) -> TiffResult<(Ifd, u64)> {
        reader.seek(SeekFrom::Start(offset))?;
        let handler = context.handler.as_ref();

        let entry_count = if context.big_tiff {
            handler.read_u64(reader)?
        } else {
            handler.read_u16(reader)? as u64
        };

        let mut raw_entries = Vec::with_capacity(entry_count.min(4096) as usize);
        for _ in 0..entry_count {
            raw_entries.push(self.read_raw_entry(reader, context)?);
        }
        let next = format_utils::read_offset(reader, context.big_tiff, handler)?;

        let mut ifd = Ifd::new();
        for raw in raw_entries {
            match self.decode_entry(reader, context, &raw) {
                Ok(record) => ifd.insert(raw.tag, record),
                Err(TiffError::UnsupportedFieldType(field_type)) => {
                    warn!("Skipping tag {} with unsupported type {} ({})", raw.tag, field_type, tag_utils::get_field_type_name(field_type));
                },
                Err(e) => return Err(e),
            }
        }

        Ok((ifd, next))
    }

    fn read_raw_entry(&self, reader: &mut dyn SeekableReader, context: &ReadContext) -> TiffResult<RawEntry> {
        let handler = context.handler.as_ref();
        let tag = handler.read_u16(reader)?;
        let field_type = handler.read_u16(reader)?;

        let mut field = [0u8; 8];
        let count = if context.big_tiff {
            let count = handler.read_u64(reader)?;
            reader.read_exact(&mut field)?;
            count
        } else {
            let count = handler.read_u32(reader)? as u64;
            reader.read_exact(&mut field[..4])?;
            count
        };

        Ok(RawEntry { tag, field_type, count, field })
    }

    /// Decodes an entry's value and, for IFD-valued tags, its chains
    fn decode_entry(&self, reader: &mut dyn SeekableReader, context: &mut ReadContext, raw: &RawEntry) -> TiffResult<TagRecord> {
        let field_len = if context.big_tiff { 8 } else { 4 };

        let data = if tag_utils::is_value_inline(raw.field_type, raw.count, context.big_tiff)? {
            let mut cursor = Cursor::new(raw.field[..field_len].to_vec());
            tag_utils::read_tag_data(&mut cursor, raw.field_type, raw.count, context.handler.as_ref())?
        } else {
            let mut cursor = Cursor::new(raw.field[..field_len].to_vec());
            let value_offset = format_utils::read_offset(&mut cursor, context.big_tiff, context.handler.as_ref())?;
            let value_len = tag_utils::field_type_size(raw.field_type)? * raw.count;
            if !validation::range_within(value_offset, value_len, context.file_size) {
                return Err(TiffError::InvalidTagValue(raw.tag, format!(
                    "{} bytes at {} run past the end of the file", value_len, value_offset)));
            }
            reader.seek(SeekFrom::Start(value_offset))?;
            tag_utils::read_tag_data(reader, raw.field_type, raw.count, context.handler.as_ref())?
        };

        let mut record = TagRecord::new(raw.field_type, data);
        record.count = raw.count;

        if self.classifier.is_sub_ifd(raw.tag) || is_ifd_datatype(raw.field_type) {
            let heads: Vec<u64> = record.data.as_integers()
                .map(|values| values.iter().map(|&v| v as u64).collect())
                .unwrap_or_default();
            for head in heads {
                let chain = self.read_chain(reader, context, head)?;
                if !chain.is_empty() {
                    record.ifds.push(chain);
                }
            }
        }

        Ok(record)
    }
}
