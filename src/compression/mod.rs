//! Compression handling for placeholder pixel data
//!
//! This module implements strategies for the two schemes placeholder chunks
//! can be stored with: raw bytes and PackBits runs.

mod handler;
mod uncompressed;
mod packbits;
mod factory;

pub use handler::CompressionHandler;
pub use uncompressed::UncompressedHandler;
pub use packbits::PackBitsHandler;
pub use factory::CompressionFactory;
