//! GeoTIFF key directory assembly
//!
//! A GeoKeyDirectoryTag is a flat SHORT array: a four-value header
//! `[version, revision, minor, key_count]` followed by one
//! `[key_id, location, count, value_or_offset]` quadruple per key. Keys whose
//! values do not fit in a SHORT live in GeoDoubleParamsTag or
//! GeoASCIIParamsTag, and `location` names that tag.

use log::debug;

use crate::tiff::constants::{field_types, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::{Ifd, TagData, TagRecord};

/// Version, revision and minor revision that precede the key count
const DIRECTORY_HEADER: [u16; 3] = [1, 1, 1];

/// Builds the three GeoTIFF tags from individual key values
///
/// Entries are emitted sorted by key id; parameter offsets keep the order
/// in which values were added.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoKeyDirectoryBuilder {
    entries: Vec<[u16; 4]>,
    doubles: Vec<f64>,
    ascii: String,
}

impl Default for GeoKeyDirectoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Narrows a directory field, failing instead of wrapping
fn to_short(value: usize, what: &str, key: u16) -> TiffResult<u16> {
    u16::try_from(value).map_err(|_| TiffError::InvalidTagValue(
        tags::GEO_KEY_DIRECTORY_TAG,
        format!("GeoKey {} {} {} does not fit in a SHORT", key, what, value),
    ))
}

impl GeoKeyDirectoryBuilder {
    pub fn new() -> Self {
        GeoKeyDirectoryBuilder {
            entries: Vec::new(),
            doubles: Vec::new(),
            ascii: String::new(),
        }
    }

    /// Number of keys added so far
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Adds a SHORT key stored directly in the directory
    pub fn add_short(&mut self, key: u16, value: u16) {
        self.push_entry([key, 0, 1, value]);
    }

    /// Adds a DOUBLE key
    ///
    /// A single integral value in the SHORT range is stored inline; anything
    /// else goes to the double parameter array.
    pub fn add_double(&mut self, key: u16, values: &[f64]) -> TiffResult<()> {
        if let [value] = values {
            if value.fract() == 0.0 && *value >= i16::MIN as f64 && *value <= i16::MAX as f64 {
                self.push_entry([key, 0, 1, *value as i16 as u16]);
                return Ok(());
            }
        }

        let offset = to_short(self.doubles.len(), "double offset", key)?;
        let count = to_short(values.len(), "value count", key)?;
        self.doubles.extend_from_slice(values);
        self.push_entry([key, tags::GEO_DOUBLE_PARAMS_TAG, count, offset]);
        Ok(())
    }

    /// Adds an ASCII key, terminated by `|` in the shared parameter string
    pub fn add_ascii(&mut self, key: u16, value: &str) -> TiffResult<()> {
        let offset = to_short(self.ascii.len(), "ASCII offset", key)?;
        let count = to_short(value.len() + 1, "ASCII length", key)?;
        self.ascii.push_str(value);
        self.ascii.push('|');
        self.push_entry([key, tags::GEO_ASCII_PARAMS_TAG, count, offset]);
        Ok(())
    }

    fn push_entry(&mut self, entry: [u16; 4]) {
        debug!("GeoKey {}: location {}, count {}, value {}", entry[0], entry[1], entry[2], entry[3]);
        self.entries.push(entry);
    }

    /// The key directory values, header included
    pub fn directory(&self) -> Vec<u16> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|entry| entry[0]);

        let mut directory = DIRECTORY_HEADER.to_vec();
        directory.push(u16::try_from(entries.len()).unwrap_or(u16::MAX));
        directory.extend(entries.iter().flatten());
        directory
    }

    /// The tag records this builder produces
    ///
    /// The double and ASCII parameter tags are only present when non-empty.
    pub fn records(&self) -> Vec<(u16, TagRecord)> {
        let mut records = vec![(
            tags::GEO_KEY_DIRECTORY_TAG,
            TagRecord::integers(field_types::SHORT, self.directory().into_iter().map(i64::from).collect()),
        )];

        if !self.doubles.is_empty() {
            records.push((
                tags::GEO_DOUBLE_PARAMS_TAG,
                TagRecord::new(field_types::DOUBLE, TagData::Floats(self.doubles.clone())),
            ));
        }

        if !self.ascii.is_empty() {
            records.push((tags::GEO_ASCII_PARAMS_TAG, TagRecord::ascii(&self.ascii)));
        }

        records
    }

    /// Writes the finished tags into an IFD, replacing dumped versions
    pub fn apply_to(&self, ifd: &mut Ifd) {
        for (tag, record) in self.records() {
            ifd.insert(tag, record);
        }
    }
}
