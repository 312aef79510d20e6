//! Hamamatsu NDPI output support

pub mod jpeg_markers;
pub mod page;
pub mod finalizer;

pub use finalizer::{is_ndpi_path, NdpiFinalizer};
pub use page::PagePixels;
