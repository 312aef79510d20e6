//! Placeholder-length ledger
//!
//! The ledger lists every block of the placeholder stream in order. Entry
//! `i` starts at the sum of the lengths of entries `0..i`; entry 0 is the
//! reservation for the file header, so the first chunk starts at offset 8.

use crate::tiff::constants::header;

/// One block of the placeholder stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Stored length of the block
    pub length: u64,
    /// Source length before encoding, for encoded blocks
    pub uncompressed_length: Option<u64>,
    /// Whether the block must be all zero bytes
    pub all_zero: bool,
}

impl LedgerEntry {
    pub fn new(length: u64, uncompressed_length: Option<u64>, all_zero: bool) -> Self {
        LedgerEntry { length, uncompressed_length, all_zero }
    }
}

/// Ordered list of placeholder blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    end: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Creates a ledger holding only the header reservation
    pub fn new() -> Self {
        Ledger {
            entries: vec![LedgerEntry::new(header::HEADER_RESERVATION, None, false)],
            end: header::HEADER_RESERVATION,
        }
    }

    /// Appends an entry and returns the offset it starts at
    pub fn push(&mut self, entry: LedgerEntry) -> u64 {
        let start = self.end;
        self.end += entry.length;
        self.entries.push(entry);
        start
    }

    /// Offset just past the last entry
    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start offset of every entry
    pub fn offsets(&self) -> Vec<u64> {
        let mut position = 0;
        self.entries.iter().map(|entry| {
            let start = position;
            position += entry.length;
            start
        }).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ledger_reserves_header() {
        let ledger = Ledger::new();
        std::assert_eq!(ledger.len(), 1);
        std::assert_eq!(ledger.end(), 8);
        std::assert_eq!(ledger.entries()[0], LedgerEntry::new(8, None, false));
    }

    #[test]
    fn test_offsets_are_cumulative() {
        let mut ledger = Ledger::new();
        std::assert_eq!(ledger.push(LedgerEntry::new(1000, None, false)), 8);
        std::assert_eq!(ledger.push(LedgerEntry::new(16, Some(1000), true)), 1008);
        std::assert_eq!(ledger.offsets(), vec![0, 8, 1008]);
        std::assert_eq!(ledger.end(), 1024);
    }
}
