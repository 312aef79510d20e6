//! Core TIFF data structures

use crate::tiff::ifd::Ifd;
use std::fmt;

/// A TIFF file as a header flag pair and its top-level IFD chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TiffStructure {
    /// Whether values are written big-endian ("MM")
    pub big_endian: bool,
    /// Whether this is a BigTIFF format
    pub big_tiff: bool,
    /// Top-level Image File Directories, in chain order
    pub ifds: Vec<Ifd>,
}

impl TiffStructure {
    /// Creates a new empty TIFF structure
    pub fn new(big_endian: bool, big_tiff: bool) -> Self {
        TiffStructure {
            big_endian,
            big_tiff,
            ifds: Vec::new(),
        }
    }

    /// Returns the main (first) IFD if available
    pub fn main_ifd(&self) -> Option<&Ifd> {
        self.ifds.first()
    }

    /// Returns the number of top-level IFDs
    pub fn ifd_count(&self) -> usize {
        self.ifds.len()
    }

    /// Number of IFDs including every nested sub-IFD
    pub fn total_ifd_count(&self) -> usize {
        self.ifds.iter().map(|ifd| 1 + ifd.nested_ifd_count()).sum()
    }
}

impl fmt::Display for TiffStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TIFF structure:")?;
        writeln!(f, "  Format: {}", if self.big_tiff { "BigTIFF" } else { "TIFF" })?;
        writeln!(f, "  Byte order: {}", if self.big_endian { "big-endian" } else { "little-endian" })?;
        writeln!(f, "  Number of IFDs: {} ({} with sub-IFDs)", self.ifds.len(), self.total_ifd_count())?;

        if let Some(ifd) = self.main_ifd() {
            write!(f, "{}", ifd)?;
        }

        Ok(())
    }
}

/// One file record from a dump: its optional name and its structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DumpRecord {
    /// Name from the `-- name --` line preceding the header
    pub name: Option<String>,
    /// The reconstructed tag tree
    pub tiff: TiffStructure,
}
