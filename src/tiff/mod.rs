//! TIFF structure handling
//!
//! This module provides the in-memory tag tree shared by the dump parser,
//! the layout recalculation and the serializer, together with a reader
//! that loads written files back into that tree.

pub mod errors;
pub mod ifd;
pub mod types;
pub mod constants;
pub mod registry;
pub mod geokeys;
pub(crate) mod validation;
pub mod reader;
pub mod writer;
mod tests;

pub use crate::io::byte_order::{BigEndianHandler, ByteOrder, ByteOrderHandler, LittleEndianHandler};
pub use errors::{TiffError, TiffResult};
pub use ifd::{Ifd, TagData, TagRecord};
pub use reader::TiffReader;
pub use registry::{default_registry, TagClassifier, TagRegistry};
pub use types::{DumpRecord, TiffStructure};
pub use writer::{TiffWriter, WriteSummary};
