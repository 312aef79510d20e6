//! Custom error types for dump parsing and TIFF reconstruction

use std::fmt;
use std::io;

/// TIFF-specific error types
#[derive(Debug)]
pub enum TiffError {
    /// I/O error
    IoError(io::Error),
    /// Invalid TIFF header
    InvalidHeader,
    /// Invalid byte order marker
    InvalidByteOrder(u16),
    /// Invalid BigTIFF header
    InvalidBigTIFFHeader,
    /// Unsupported TIFF version
    UnsupportedVersion(u16),
    /// Tag not found
    TagNotFound(u16),
    /// A tag needed to compute chunk geometry is absent
    MissingGeometryTag(u16, String),
    /// Unsupported field type
    UnsupportedFieldType(u16),
    /// Datatype name in a dump line that the registry does not know
    UnknownDatatype(String),
    /// Tag set name in a sub-IFD line that the registry does not know
    UnknownTagName(String),
    /// A tag value that cannot be decoded or encoded
    InvalidTagValue(u16, String),
    /// Structural dump line in a position where it cannot apply
    DumpSyntax(usize, String),
    /// Unsupported compression method
    UnsupportedCompression(u64),
    /// Classic TIFF offset overflow
    OffsetOverflow(u64),
    /// Source contained no TIFF record
    NoRecords,
    /// Structured (JSON) dump error
    JsonError(serde_json::Error),
    /// Image encoding error
    ImageError(image::ImageError),
    /// External command failed
    ExternalTool(String),
    /// Generic error with message
    GenericError(String),
}

impl fmt::Display for TiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TiffError::IoError(e) => write!(f, "I/O error: {}", e),
            TiffError::InvalidHeader => write!(f, "Invalid TIFF header"),
            TiffError::InvalidByteOrder(v) => write!(f, "Invalid byte order marker: {:#06x}", v),
            TiffError::InvalidBigTIFFHeader => write!(f, "Invalid BigTIFF header"),
            TiffError::UnsupportedVersion(v) => write!(f, "Unsupported TIFF version: {}", v),
            TiffError::TagNotFound(tag) => write!(f, "Tag not found: {}", tag),
            TiffError::MissingGeometryTag(tag, name) =>
                write!(f, "Missing geometry tag {} ({}) in a directory with pixel data", tag, name),
            TiffError::UnsupportedFieldType(ft) => write!(f, "Unsupported field type: {}", ft),
            TiffError::UnknownDatatype(name) => write!(f, "Unknown TIFF datatype: {}", name),
            TiffError::UnknownTagName(name) => write!(f, "Unknown tag name: {}", name),
            TiffError::InvalidTagValue(tag, msg) => write!(f, "Invalid value for tag {}: {}", tag, msg),
            TiffError::DumpSyntax(line, msg) => write!(f, "Dump line {}: {}", line, msg),
            TiffError::UnsupportedCompression(c) => write!(f, "Unsupported compression method: {}", c),
            TiffError::OffsetOverflow(v) => write!(f, "Offset {} does not fit in a classic TIFF", v),
            TiffError::NoRecords => write!(f, "No TIFF records found in source"),
            TiffError::JsonError(e) => write!(f, "JSON error: {}", e),
            TiffError::ImageError(e) => write!(f, "Image error: {}", e),
            TiffError::ExternalTool(msg) => write!(f, "External tool error: {}", msg),
            TiffError::GenericError(msg) => write!(f, "TIFF error: {}", msg),
        }
    }
}

impl std::error::Error for TiffError {}

impl From<io::Error> for TiffError {
    fn from(error: io::Error) -> Self {
        TiffError::IoError(error)
    }
}

impl From<serde_json::Error> for TiffError {
    fn from(error: serde_json::Error) -> Self {
        TiffError::JsonError(error)
    }
}

impl From<image::ImageError> for TiffError {
    fn from(error: image::ImageError) -> Self {
        TiffError::ImageError(error)
    }
}

/// Result type for TIFF operations
pub type TiffResult<T> = Result<T, TiffError>;

impl From<String> for TiffError {
    fn from(msg: String) -> Self {
        TiffError::GenericError(msg)
    }
}
