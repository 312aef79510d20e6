//! Placeholder layout
//!
//! Recomputes strip and tile layout for synthetic pixel data and produces the
//! placeholder byte stream the serializer copies chunks from.

pub mod ledger;
pub mod recalculator;
pub mod generator;

pub use ledger::{Ledger, LedgerEntry};
pub use recalculator::{ChunkGeometry, LayoutRecalculator};
pub use generator::{fill_byte, ChunkGenerator};
