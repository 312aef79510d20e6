//! TIFF serialization
//!
//! Writes a tag tree to disk as TIFF or BigTIFF. Chunk data is not held in
//! the tree: offset tags hold positions in a separate chunk source, and the
//! writer copies each referenced block from there.
//!
//! Output order is the header, then every IFD depth first (each directory
//! immediately followed by its out-of-line values), then the chunk data.
//! Offsets are planned in full before anything is written, so a classic
//! file that would not fit in 32-bit offsets is planned again as BigTIFF.

use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::io::byte_order::{ByteOrder, ByteOrderHandler};
use crate::io::seekable::{self, SeekableReader};
use crate::tiff::constants::{field_types, header};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::{Ifd, TagData, TagRecord};
use crate::tiff::registry::{is_ifd_datatype, TagClassifier};
use crate::tiff::types::TiffStructure;
use crate::utils::progress::ProgressTracker;
use crate::utils::{tag_utils, write_utils};

/// What a finished write produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    /// Whether the file was written as BigTIFF
    pub big_tiff: bool,
    /// Number of IFDs written, nested ones included
    pub ifd_count: usize,
    /// Number of distinct chunk blocks copied
    pub chunk_count: usize,
    /// Total file length
    pub bytes_written: u64,
}

/// Value of one planned directory entry
enum Payload {
    /// Encoded value bytes
    Bytes(Vec<u8>),
    /// Source blocks (offset, length) whose destinations are the value
    Chunks(Vec<(u64, u64)>),
    /// Planned IFD indices of chain heads
    Chains(Vec<usize>),
}

struct PlannedEntry {
    tag: u16,
    datatype: u16,
    count: u64,
    payload: Payload,
    value_offset: Option<u64>,
}

struct PlannedIfd {
    offset: u64,
    entries: Vec<PlannedEntry>,
    next: Option<usize>,
}

/// One copy from the chunk source
struct ChunkCopy {
    source: u64,
    length: u64,
    destination: u64,
}

/// File layout computed before writing
struct Plan {
    big_tiff: bool,
    /// Set when a classic plan hits a value that needs BigTIFF
    needs_big_tiff: bool,
    ifds: Vec<PlannedIfd>,
    first: Option<usize>,
    chunks: Vec<ChunkCopy>,
    chunk_destinations: HashMap<(u64, u64), u64>,
    end: u64,
}

impl Plan {
    fn new(big_tiff: bool) -> Self {
        Plan {
            big_tiff,
            needs_big_tiff: false,
            ifds: Vec::new(),
            first: None,
            chunks: Vec::new(),
            chunk_destinations: HashMap::new(),
            end: 0,
        }
    }

    fn offset_type(&self) -> u16 {
        if self.big_tiff { field_types::LONG8 } else { field_types::LONG }
    }

    fn offset_size(&self) -> u64 {
        if self.big_tiff { 8 } else { 4 }
    }

    fn payload_len(&self, payload: &Payload) -> u64 {
        match payload {
            Payload::Bytes(bytes) => bytes.len() as u64,
            Payload::Chunks(ranges) => ranges.len() as u64 * self.offset_size(),
            Payload::Chains(heads) => heads.len() as u64 * self.offset_size(),
        }
    }
}

/// Writes tag trees as TIFF files
pub struct TiffWriter<'a> {
    classifier: &'a dyn TagClassifier,
    show_progress: bool,
}

impl<'a> TiffWriter<'a> {
    pub fn new(classifier: &'a dyn TagClassifier) -> Self {
        TiffWriter { classifier, show_progress: false }
    }

    /// Draw a progress bar while copying chunks
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Writes `structure` to `output`, copying chunk data from `source`
    ///
    /// The output file is created or truncated.
    pub fn write(&self, structure: &TiffStructure, source: &mut dyn SeekableReader, output: &Path) -> TiffResult<WriteSummary> {
        let handler = ByteOrder::from_big_endian(structure.big_endian).create_handler();

        let mut plan = self.plan(structure, structure.big_tiff, handler.as_ref())?;
        if !plan.big_tiff && (plan.needs_big_tiff || plan.end > u32::MAX as u64) {
            info!("Output needs 64-bit offsets ({} bytes); writing BigTIFF", plan.end);
            plan = self.plan(structure, true, handler.as_ref())?;
        }

        info!("Writing {} to {}", if plan.big_tiff { "BigTIFF" } else { "TIFF" }, output.display());
        let file = File::create(output)?;
        let mut writer = BufWriter::with_capacity(1024 * 1024, file);

        let mut position = self.write_header(&mut writer, &plan, structure.big_endian, handler.as_ref())?;
        position = self.write_directories(&mut writer, &plan, position, handler.as_ref())?;
        position = self.copy_chunks(&mut writer, &plan, position, source)?;
        writer.flush()?;

        let summary = WriteSummary {
            big_tiff: plan.big_tiff,
            ifd_count: plan.ifds.len(),
            chunk_count: plan.chunks.len(),
            bytes_written: position,
        };
        debug!("Write summary: {:?}", summary);
        Ok(summary)
    }

    fn plan(&self, structure: &TiffStructure, big_tiff: bool, handler: &dyn ByteOrderHandler) -> TiffResult<Plan> {
        let mut plan = Plan::new(big_tiff);
        plan.first = self.plan_chain(&mut plan, &structure.ifds, handler)?;
        self.assign_offsets(&mut plan);
        Ok(plan)
    }

    /// Adds a chain in pre-order and links it; returns its head
    fn plan_chain(&self, plan: &mut Plan, chain: &[Ifd], handler: &dyn ByteOrderHandler) -> TiffResult<Option<usize>> {
        let mut head = None;
        let mut previous: Option<usize> = None;

        for ifd in chain {
            let index = self.plan_ifd(plan, ifd, handler)?;
            match previous {
                Some(previous) => plan.ifds[previous].next = Some(index),
                None => head = Some(index),
            }
            previous = Some(index);
        }

        Ok(head)
    }

    fn plan_ifd(&self, plan: &mut Plan, ifd: &Ifd, handler: &dyn ByteOrderHandler) -> TiffResult<usize> {
        let index = plan.ifds.len();
        plan.ifds.push(PlannedIfd { offset: 0, entries: Vec::new(), next: None });

        let count_tags: BTreeSet<u16> = ifd.tags.keys()
            .filter(|&&tag| self.classifier.is_offset_data(tag))
            .filter_map(|&tag| self.classifier.byte_counts_tag(tag))
            .collect();

        let mut entries = Vec::with_capacity(ifd.tags.len());
        for (&tag, record) in &ifd.tags {
            let entry = if self.classifier.is_sub_ifd(tag) || is_ifd_datatype(record.datatype) {
                self.plan_sub_ifds(plan, tag, record, handler)?
            } else if self.classifier.is_offset_data(tag) && record.data.as_integers().is_some() {
                Some(self.plan_chunks(plan, ifd, tag, record))
            } else if count_tags.contains(&tag) {
                Some(self.plan_byte_counts(plan, tag, record, handler)?)
            } else {
                Some(self.plan_value(plan, tag, record, handler)?)
            };
            entries.extend(entry);
        }

        plan.ifds[index].entries = entries;
        Ok(index)
    }

    fn plan_sub_ifds(&self, plan: &mut Plan, tag: u16, record: &TagRecord, handler: &dyn ByteOrderHandler) -> TiffResult<Option<PlannedEntry>> {
        if record.ifds.is_empty() {
            warn!("Dropping sub-IFD tag {}: no IFD chains to point at", tag);
            return Ok(None);
        }

        let mut heads = Vec::with_capacity(record.ifds.len());
        for chain in &record.ifds {
            if let Some(head) = self.plan_chain(plan, chain, handler)? {
                heads.push(head);
            }
        }

        let datatype = match (record.datatype, plan.big_tiff) {
            (field_types::LONG | field_types::LONG8, true) => field_types::LONG8,
            (field_types::LONG | field_types::LONG8, false) => field_types::LONG,
            (_, true) => field_types::IFD8,
            (_, false) => field_types::IFD,
        };

        Ok(Some(PlannedEntry {
            tag,
            datatype,
            count: heads.len() as u64,
            payload: Payload::Chains(heads),
            value_offset: None,
        }))
    }

    fn plan_chunks(&self, plan: &mut Plan, ifd: &Ifd, tag: u16, record: &TagRecord) -> PlannedEntry {
        let offsets = record.data.as_integers().unwrap_or(&[]);
        let lengths = self.classifier.byte_counts_tag(tag).and_then(|counts| ifd.values(counts));
        let fixed = self.classifier.fixed_length(tag);

        let ranges: Vec<(u64, u64)> = offsets.iter()
            .enumerate()
            .map(|(i, &offset)| {
                let length = lengths
                    .and_then(|lengths| lengths.get(i).copied())
                    .map(|length| length.max(0) as u64)
                    .or(fixed)
                    .unwrap_or_else(|| {
                        warn!("No block length for entry {} of tag {}; writing an empty block", i, tag);
                        0
                    });
                (offset.max(0) as u64, length)
            })
            .collect();

        if ifd.size > 0 {
            if let Some(&(offset, length)) = ranges.iter().find(|&&(o, l)| o + l > ifd.size) {
                warn!("Tag {} references {} bytes at {}, past the data extent {}", tag, length, offset, ifd.size);
            }
        }

        PlannedEntry {
            tag,
            datatype: plan.offset_type(),
            count: ranges.len() as u64,
            payload: Payload::Chunks(ranges),
            value_offset: None,
        }
    }

    /// Keeps the byte-count datatype unless a value overflows it
    fn plan_byte_counts(&self, plan: &mut Plan, tag: u16, record: &TagRecord, handler: &dyn ByteOrderHandler) -> TiffResult<PlannedEntry> {
        let max = record.data.max_integer().unwrap_or(0).max(0) as u64;
        let width_rank = |datatype: u16| match datatype {
            field_types::SHORT => 0,
            field_types::LONG => 1,
            _ => 2,
        };
        let needed_rank = if max <= u16::MAX as u64 { 0 } else if max <= u32::MAX as u64 { 1 } else { 2 };
        let mut rank = width_rank(record.datatype).max(needed_rank);
        if rank == 2 && !plan.big_tiff {
            if needed_rank == 2 {
                plan.needs_big_tiff = true;
            } else {
                rank = 1;
            }
        }

        let datatype = [field_types::SHORT, field_types::LONG, field_types::LONG8][rank];
        if datatype != record.datatype {
            debug!("Byte counts tag {} written as {} (was {})", tag,
                   tag_utils::get_field_type_name(datatype), tag_utils::get_field_type_name(record.datatype));
        }
        self.encoded_entry(tag, datatype, &record.data, handler)
    }

    /// Plans a plain value, narrowing 64-bit types for classic output
    fn plan_value(&self, plan: &mut Plan, tag: u16, record: &TagRecord, handler: &dyn ByteOrderHandler) -> TiffResult<PlannedEntry> {
        let datatype = if plan.big_tiff {
            record.datatype
        } else {
            let values = record.data.as_integers().unwrap_or(&[]);
            match record.datatype {
                field_types::LONG8 | field_types::IFD8 => {
                    if values.iter().all(|&v| v >= 0 && v <= u32::MAX as i64) {
                        if record.datatype == field_types::LONG8 { field_types::LONG } else { field_types::IFD }
                    } else {
                        plan.needs_big_tiff = true;
                        record.datatype
                    }
                },
                field_types::SLONG8 => {
                    if values.iter().all(|&v| v >= i32::MIN as i64 && v <= i32::MAX as i64) {
                        field_types::SLONG
                    } else {
                        plan.needs_big_tiff = true;
                        record.datatype
                    }
                },
                other => other,
            }
        };
        self.encoded_entry(tag, datatype, &record.data, handler)
    }

    fn encoded_entry(&self, tag: u16, datatype: u16, data: &TagData, handler: &dyn ByteOrderHandler) -> TiffResult<PlannedEntry> {
        let bytes = tag_utils::encode_tag_data(datatype, data, handler)?;
        let count = bytes.len() as u64 / tag_utils::field_type_size(datatype)?;
        Ok(PlannedEntry {
            tag,
            datatype,
            count,
            payload: Payload::Bytes(bytes),
            value_offset: None,
        })
    }

    /// Places directories, out-of-line values and chunk blocks
    fn assign_offsets(&self, plan: &mut Plan) {
        let big_tiff = plan.big_tiff;
        let (count_size, entry_size, link_size, inline_size) = if big_tiff { (8, 20, 8, 8) } else { (2, 12, 4, 4) };
        let mut position = if big_tiff { 16 } else { header::HEADER_RESERVATION };

        let offset_size = plan.offset_size();
        for ifd in plan.ifds.iter_mut() {
            position = write_utils::align_to_4_bytes(position);
            ifd.offset = position;
            position += count_size + entry_size * ifd.entries.len() as u64 + link_size;

            for entry in ifd.entries.iter_mut() {
                let len = match &entry.payload {
                    Payload::Bytes(bytes) => bytes.len() as u64,
                    Payload::Chunks(ranges) => ranges.len() as u64 * offset_size,
                    Payload::Chains(heads) => heads.len() as u64 * offset_size,
                };
                if len > inline_size {
                    position = write_utils::align_to_4_bytes(position);
                    entry.value_offset = Some(position);
                    position += len;
                }
            }
        }

        for ifd in &plan.ifds {
            for entry in &ifd.entries {
                if let Payload::Chunks(ranges) = &entry.payload {
                    for &(source, length) in ranges {
                        if length == 0 || plan.chunk_destinations.contains_key(&(source, length)) {
                            continue;
                        }
                        plan.chunk_destinations.insert((source, length), position);
                        plan.chunks.push(ChunkCopy { source, length, destination: position });
                        position += length;
                    }
                }
            }
        }

        plan.end = position;
        debug!("Planned {} IFDs and {} chunk blocks, {} bytes", plan.ifds.len(), plan.chunks.len(), position);
    }

    fn write_header(&self, writer: &mut dyn Write, plan: &Plan, big_endian: bool, handler: &dyn ByteOrderHandler) -> TiffResult<u64> {
        let first = plan.first.map(|index| plan.ifds[index].offset).unwrap_or(0);
        writer.write_all(&ByteOrder::from_big_endian(big_endian).marker())?;

        if plan.big_tiff {
            handler.write_u16(writer, header::BIG_TIFF_VERSION)?;
            handler.write_u16(writer, header::BIGTIFF_OFFSET_SIZE)?;
            handler.write_u16(writer, 0)?;
            handler.write_u64(writer, first)?;
            Ok(16)
        } else {
            handler.write_u16(writer, header::TIFF_VERSION)?;
            handler.write_u32(writer, first as u32)?;
            Ok(8)
        }
    }

    fn write_directories(&self, writer: &mut dyn Write, plan: &Plan, mut position: u64, handler: &dyn ByteOrderHandler) -> TiffResult<u64> {
        for ifd in &plan.ifds {
            write_utils::pad_to(writer, position, ifd.offset)?;
            position = ifd.offset;

            if plan.big_tiff {
                handler.write_u64(writer, ifd.entries.len() as u64)?;
                position += 8;
            } else {
                handler.write_u16(writer, ifd.entries.len() as u16)?;
                position += 2;
            }

            let mut values: Vec<(u64, Vec<u8>)> = Vec::new();
            for entry in &ifd.entries {
                let bytes = self.payload_bytes(plan, &entry.payload, entry.datatype, handler)?;
                handler.write_u16(writer, entry.tag)?;
                handler.write_u16(writer, entry.datatype)?;

                let mut field = Vec::with_capacity(8);
                match entry.value_offset {
                    Some(offset) => {
                        if plan.big_tiff {
                            handler.write_u64(&mut field, offset)?;
                        } else {
                            handler.write_u32(&mut field, offset as u32)?;
                        }
                        values.push((offset, bytes));
                    },
                    None => field.extend_from_slice(&bytes),
                }

                if plan.big_tiff {
                    handler.write_u64(writer, entry.count)?;
                    field.resize(8, 0);
                } else {
                    handler.write_u32(writer, entry.count as u32)?;
                    field.resize(4, 0);
                }
                writer.write_all(&field)?;
                position += if plan.big_tiff { 20 } else { 12 };
            }

            let next = ifd.next.map(|index| plan.ifds[index].offset).unwrap_or(0);
            if plan.big_tiff {
                handler.write_u64(writer, next)?;
                position += 8;
            } else {
                handler.write_u32(writer, next as u32)?;
                position += 4;
            }

            for (offset, bytes) in values {
                write_utils::pad_to(writer, position, offset)?;
                writer.write_all(&bytes)?;
                position = offset + bytes.len() as u64;
            }
        }

        Ok(position)
    }

    fn payload_bytes(&self, plan: &Plan, payload: &Payload, datatype: u16, handler: &dyn ByteOrderHandler) -> TiffResult<Vec<u8>> {
        let offsets: Vec<i64> = match payload {
            Payload::Bytes(bytes) => return Ok(bytes.clone()),
            Payload::Chunks(ranges) => ranges.iter()
                .map(|range| plan.chunk_destinations.get(range).copied().unwrap_or(0) as i64)
                .collect(),
            Payload::Chains(heads) => heads.iter()
                .map(|&head| plan.ifds[head].offset as i64)
                .collect(),
        };
        let bytes = tag_utils::encode_tag_data(datatype, &TagData::Integers(offsets), handler)?;
        if bytes.len() as u64 != plan.payload_len(payload) {
            return Err(TiffError::GenericError(format!("Offset array of type {} has unexpected size", datatype)));
        }
        Ok(bytes)
    }

    fn copy_chunks(&self, writer: &mut dyn Write, plan: &Plan, mut position: u64, source: &mut dyn SeekableReader) -> TiffResult<u64> {
        let total: u64 = plan.chunks.iter().map(|chunk| chunk.length).sum();
        let progress = if self.show_progress {
            ProgressTracker::new(total, "Copying chunk data")
        } else {
            ProgressTracker::hidden()
        };

        let mut buffer = vec![0u8; write_utils::WRITE_BLOCK as usize];
        for chunk in &plan.chunks {
            write_utils::pad_to(writer, position, chunk.destination)?;
            position = chunk.destination;

            let mut copied = 0u64;
            while copied < chunk.length {
                let want = write_utils::WRITE_BLOCK.min(chunk.length - copied) as usize;
                let read = seekable::read_at(source, chunk.source + copied, &mut buffer[..want])?;
                if read == 0 {
                    warn!("Chunk source ends {} bytes into a {} byte block at {}; padding with zeros",
                          copied, chunk.length, chunk.source);
                    write_utils::write_repeated(writer, 0, chunk.length - copied)?;
                    progress.increment(chunk.length - copied);
                    break;
                }
                writer.write_all(&buffer[..read])?;
                copied += read as u64;
                progress.increment(read as u64);
            }
            position += chunk.length;
        }

        progress.finish();
        Ok(position)
    }
}
