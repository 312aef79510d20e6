//! I/O utilities for file handling
//!
//! This module provides the seekable reader abstraction and the byte order
//! strategies used when reading and writing TIFF structures.

pub mod seekable;
pub mod byte_order;
