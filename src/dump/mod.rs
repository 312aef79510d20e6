//! Tag dump loading
//!
//! A dump is either JSON in the structured schema or the text listing
//! printed by `tifftools dump`. JSON is tried first; anything that is not
//! JSON at all is parsed as text.

pub mod line;
pub mod values;
pub mod parser;
pub mod structured;

use std::fs;
use std::path::Path;
use log::{debug, info};

use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::registry::TagClassifier;
use crate::tiff::types::DumpRecord;

pub use line::{classify, DumpLine, TagLine};
pub use parser::DumpParser;

/// Loads every record from a dump file
pub fn load_records(path: &Path, classifier: &dyn TagClassifier) -> TiffResult<Vec<DumpRecord>> {
    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    let records = parse_records(&content, classifier)?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Parses dump content already in memory
pub fn parse_records(content: &str, classifier: &dyn TagClassifier) -> TiffResult<Vec<DumpRecord>> {
    let records = match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value) => {
            debug!("Input is JSON; using the structured schema");
            structured::records_from_json(value, classifier)?
        },
        Err(_) => DumpParser::new(classifier).parse(content)?,
    };

    if records.is_empty() {
        return Err(TiffError::NoRecords);
    }
    Ok(records)
}
