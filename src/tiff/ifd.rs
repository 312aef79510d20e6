//! Image File Directory (IFD) structures and methods
//!
//! This module implements the in-memory tag tree used while rebuilding a
//! TIFF: an IFD is an ordered map from tag id to a decoded tag record, and
//! IFD-valued tags (SubIFD, EXIF, GPS, ...) carry nested chains of IFDs.

use std::collections::BTreeMap;
use std::fmt;
use log::trace;

use crate::tiff::constants::{field_types, tags};

/// Decoded values of one tag
#[derive(Debug, Clone, PartialEq)]
pub enum TagData {
    /// ASCII text without the trailing NUL
    Ascii(String),
    /// Raw BYTE/UNDEFINED content
    Bytes(Vec<u8>),
    /// Integer values; RATIONAL types hold numerator/denominator pairs
    Integers(Vec<i64>),
    /// FLOAT/DOUBLE values
    Floats(Vec<f64>),
}

impl TagData {
    /// Number of stored elements (characters for text)
    pub fn len(&self) -> usize {
        match self {
            TagData::Ascii(text) => text.len(),
            TagData::Bytes(bytes) => bytes.len(),
            TagData::Integers(values) => values.len(),
            TagData::Floats(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integer view of the data, if it holds integers
    pub fn as_integers(&self) -> Option<&[i64]> {
        match self {
            TagData::Integers(values) => Some(values),
            _ => None,
        }
    }

    /// Text view of the data, if it holds text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagData::Ascii(text) => Some(text),
            _ => None,
        }
    }

    /// First element interpreted as an integer
    pub fn first_integer(&self) -> Option<i64> {
        match self {
            TagData::Integers(values) => values.first().copied(),
            TagData::Floats(values) => values.first().map(|v| *v as i64),
            TagData::Bytes(bytes) => bytes.first().map(|b| *b as i64),
            TagData::Ascii(_) => None,
        }
    }

    /// Largest element interpreted as an integer
    pub fn max_integer(&self) -> Option<i64> {
        match self {
            TagData::Integers(values) => values.iter().copied().max(),
            TagData::Bytes(bytes) => bytes.iter().map(|b| *b as i64).max(),
            TagData::Floats(values) => values.iter().map(|v| *v as i64).max(),
            TagData::Ascii(_) => None,
        }
    }
}

/// A single decoded TIFF tag
#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    /// TIFF datatype code
    pub datatype: u16,
    /// Value count as declared by the source
    pub count: u64,
    /// Decoded values
    pub data: TagData,
    /// Sub-IFD chains for IFD-valued tags
    pub ifds: Vec<Vec<Ifd>>,
}

impl TagRecord {
    /// Creates a record whose count is derived from its data
    pub fn new(datatype: u16, data: TagData) -> Self {
        let count = value_count(datatype, &data);
        TagRecord {
            datatype,
            count,
            data,
            ifds: Vec::new(),
        }
    }

    /// Creates an integer-valued record
    pub fn integers(datatype: u16, values: Vec<i64>) -> Self {
        Self::new(datatype, TagData::Integers(values))
    }

    /// Creates an ASCII record
    pub fn ascii(text: &str) -> Self {
        Self::new(field_types::ASCII, TagData::Ascii(text.to_string()))
    }

    /// Creates an IFD-valued record with no chains yet
    pub fn sub_ifd_holder(datatype: u16) -> Self {
        TagRecord {
            datatype,
            count: 0,
            data: TagData::Integers(Vec::new()),
            ifds: Vec::new(),
        }
    }

    /// Whether this record points at nested IFD chains
    pub fn has_sub_ifds(&self) -> bool {
        !self.ifds.is_empty()
    }

    /// Replaces the data and recomputes the count
    pub fn set_data(&mut self, data: TagData) {
        self.count = value_count(self.datatype, &data);
        self.data = data;
    }
}

/// Number of TIFF values the data represents for a datatype
pub fn value_count(datatype: u16, data: &TagData) -> u64 {
    match (datatype, data) {
        (field_types::ASCII, TagData::Ascii(text)) => {
            if text.ends_with('\0') { text.len() as u64 } else { text.len() as u64 + 1 }
        },
        (field_types::RATIONAL | field_types::SRATIONAL, _) => (data.len() / 2) as u64,
        _ => data.len() as u64,
    }
}

/// Represents an Image File Directory (IFD) in the tag tree
///
/// Tags are kept ordered by id, which is the order a TIFF directory
/// must be written in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ifd {
    /// Tag records keyed by tag id
    pub tags: BTreeMap<u16, TagRecord>,
    /// Extent of the placeholder stream once this IFD's chunks are laid out
    pub size: u64,
}

impl Ifd {
    /// Creates an empty IFD
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a tag record
    pub fn insert(&mut self, tag: u16, record: TagRecord) {
        trace!("Setting tag {} (type {}, count {})", tag, record.datatype, record.count);
        self.tags.insert(tag, record);
    }

    /// Replaces a tag's values, adding the tag with `datatype` if absent
    pub fn set_integers(&mut self, tag: u16, datatype: u16, values: Vec<i64>) {
        match self.get_mut(tag) {
            Some(record) => record.set_data(TagData::Integers(values)),
            None => self.insert(tag, TagRecord::integers(datatype, values)),
        }
    }

    pub fn get(&self, tag: u16) -> Option<&TagRecord> {
        self.tags.get(&tag)
    }

    pub fn get_mut(&mut self, tag: u16) -> Option<&mut TagRecord> {
        self.tags.get_mut(&tag)
    }

    pub fn remove(&mut self, tag: u16) -> Option<TagRecord> {
        self.tags.remove(&tag)
    }

    /// Checks if this IFD has a specific tag
    pub fn has_tag(&self, tag: u16) -> bool {
        self.tags.contains_key(&tag)
    }

    /// First value of a tag as an integer
    pub fn first_value(&self, tag: u16) -> Option<i64> {
        self.get(tag).and_then(|record| record.data.first_integer())
    }

    /// All integer values of a tag
    pub fn values(&self, tag: u16) -> Option<&[i64]> {
        self.get(tag).and_then(|record| record.data.as_integers())
    }

    /// Text value of an ASCII tag
    pub fn text(&self, tag: u16) -> Option<&str> {
        self.get(tag).and_then(|record| record.data.as_text())
    }

    /// Gets the dimensions of the image described by this IFD
    pub fn get_dimensions(&self) -> Option<(u64, u64)> {
        let width = self.first_value(tags::IMAGE_WIDTH)?;
        let height = self.first_value(tags::IMAGE_LENGTH)?;
        Some((width as u64, height as u64))
    }

    /// Returns number of samples per pixel (default 1 if not specified)
    pub fn get_samples_per_pixel(&self) -> u64 {
        self.first_value(tags::SAMPLES_PER_PIXEL).unwrap_or(1) as u64
    }

    /// Gets the number of tags in this IFD
    pub fn entry_count(&self) -> usize {
        self.tags.len()
    }

    /// Total number of IFDs in this IFD's sub-IFD chains, recursively
    pub fn nested_ifd_count(&self) -> usize {
        self.tags.values()
            .flat_map(|record| record.ifds.iter())
            .flat_map(|chain| chain.iter())
            .map(|ifd| 1 + ifd.nested_ifd_count())
            .sum()
    }
}

impl fmt::Display for Ifd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IFD ({} tags, placeholder extent {})", self.tags.len(), self.size)?;

        if let Some((width, height)) = self.get_dimensions() {
            writeln!(f, "  Dimensions: {}x{}", width, height)?;
        }

        for (tag, record) in &self.tags {
            write!(f, "    {} [type {}] count {}", tag, record.datatype, record.count)?;
            if record.has_sub_ifds() {
                write!(f, " ({} sub-IFD chains)", record.ifds.len())?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
