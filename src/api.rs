use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};

use crate::compression::{CompressionFactory, CompressionHandler};
use crate::dump;
use crate::layout::{ChunkGenerator, LayoutRecalculator};
use crate::ndpi::{self, NdpiFinalizer};
use crate::tiff::constants::compression;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::registry::{default_registry, TagClassifier};
use crate::tiff::types::DumpRecord;
use crate::tiff::writer::{TiffWriter, WriteSummary};
use crate::utils::imagej_utils;
use crate::utils::logger::Logger;

/// Pipeline stage a record has reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Parsing,
    LayoutRecalculated,
    BytesGenerated,
    Serialized,
    NdpiFinalized,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Parsing => "parsing",
            Stage::LayoutRecalculated => "layout recalculated",
            Stage::BytesGenerated => "bytes generated",
            Stage::Serialized => "serialized",
            Stage::NdpiFinalized => "NDPI finalized",
            Stage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Result of rebuilding one record
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Record name from the dump, or the source file name
    pub name: String,
    /// File the record was written to
    pub output: PathBuf,
    /// Last stage reached
    pub stage: Stage,
    /// Serializer statistics of the final write
    pub summary: WriteSummary,
    /// Pages converted to JPEG for NDPI output
    pub ndpi_pages: usize,
    /// Zero bytes appended for an ImageJ stack
    pub imagej_padding: u64,
}

/// Tracks one record through the stages and reports each transition
struct StageTracker<'a> {
    logger: &'a Logger,
    record: String,
    stage: Stage,
}

impl<'a> StageTracker<'a> {
    fn advance(&mut self, next: Stage, detail: &str) {
        debug!("{}: {} -> {}", self.record, self.stage, next);
        self.stage = next;
        info!("{}: {} {}", self.record, next, detail);
        if let Err(e) = self.logger.log_stage(&self.record, &next.to_string(), detail) {
            warn!("Cannot write run log: {}", e);
        }
    }
}

/// Rebuilds TIFF files from `tifftools dump` output
///
/// Each dumped record goes through layout recalculation, placeholder
/// generation and serialization, then the NDPI and ImageJ post-processing
/// steps where they apply.
pub struct TiffReconstructor<'a> {
    logger: &'a Logger,
    classifier: &'a dyn TagClassifier,
    codec: Box<dyn CompressionHandler>,
    jpegtran: Option<PathBuf>,
    show_progress: bool,
}

impl<'a> TiffReconstructor<'a> {
    /// Creates a reconstructor
    ///
    /// # Arguments
    /// * `logger` - Run log receiving one line per stage
    /// * `compression_name` - `packbits` or `none`
    ///
    /// # Returns
    /// A reconstructor or an error for an unknown compression name
    pub fn new(logger: &'a Logger, compression_name: &str) -> TiffResult<Self> {
        let codec = CompressionFactory::get_handler_by_name(compression_name)?;
        info!("Using {} placeholder compression", codec.name());
        Ok(TiffReconstructor {
            logger,
            classifier: default_registry(),
            codec,
            jpegtran: None,
            show_progress: false,
        })
    }

    /// Uses a different tag classifier
    pub fn with_classifier(mut self, classifier: &'a dyn TagClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Uses a specific `jpegtran` executable for NDPI output
    pub fn with_jpegtran(mut self, jpegtran: impl Into<PathBuf>) -> Self {
        self.jpegtran = Some(jpegtran.into());
        self
    }

    /// Draw progress bars for long writes
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Parses a dump file into its records
    pub fn load_records(&self, source: &Path) -> TiffResult<Vec<DumpRecord>> {
        dump::load_records(source, self.classifier)
    }

    /// Rebuilds every record of `source`
    ///
    /// The first record is written to `output`; later records go to
    /// numbered siblings (see [`output_path_for`]).
    pub fn reconstruct(&self, source: &Path, output: &Path) -> TiffResult<Vec<Reconstruction>> {
        let fallback = source.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());

        let mut tracker = StageTracker { logger: self.logger, record: fallback.clone(), stage: Stage::Idle };
        tracker.advance(Stage::Parsing, &source.display().to_string());
        let records = self.load_records(source)?;
        if records.len() > 1 {
            info!("Dump holds {} records", records.len());
        }

        let mut results = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let destination = output_path_for(output, index);
            let name = record.name.clone().unwrap_or_else(|| fallback.clone());
            results.push(self.reconstruct_record(record, &name, &destination)?);
        }
        Ok(results)
    }

    /// Rebuilds one parsed record into `output`
    pub fn reconstruct_record(&self, record: DumpRecord, name: &str, output: &Path) -> TiffResult<Reconstruction> {
        let mut tracker = StageTracker { logger: self.logger, record: name.to_string(), stage: Stage::Parsing };
        let mut structure = record.tiff;
        if structure.ifds.is_empty() {
            return Err(TiffError::GenericError(format!("Record {} has no directories", name)));
        }

        let ledger = LayoutRecalculator::new(self.codec.as_ref(), self.classifier).recalculate(&mut structure)?;
        tracker.advance(Stage::LayoutRecalculated, &format!("{} blocks", ledger.len()));

        let mut scratch = tempfile::tempfile()?;
        {
            let mut writer = BufWriter::new(&mut scratch);
            let generated = ChunkGenerator::new(self.codec.as_ref())
                .with_progress(self.show_progress)
                .generate(&ledger, &mut writer)?;
            tracker.advance(Stage::BytesGenerated, &format!("{} bytes", generated));
        }

        let mut summary = TiffWriter::new(self.classifier)
            .with_progress(self.show_progress)
            .write(&structure, &mut scratch, output)?;
        tracker.advance(Stage::Serialized, &format!(
            "{} IFDs, {} bytes{}",
            summary.ifd_count,
            summary.bytes_written,
            if summary.big_tiff { ", BigTIFF" } else { "" }
        ));

        let mut ndpi_pages = 0;
        if ndpi::is_ndpi_path(output) {
            let mut finalizer = NdpiFinalizer::new(self.classifier);
            if let Some(jpegtran) = &self.jpegtran {
                finalizer = finalizer.with_jpegtran(jpegtran.clone());
            }
            ndpi_pages = finalizer.finalize(output)?;
            summary.bytes_written = std::fs::metadata(output)?.len();
            tracker.advance(Stage::NdpiFinalized, &format!("{} pages", ndpi_pages));
        }

        let uncompressed = self.codec.code() == compression::NONE as u64;
        let imagej_padding = imagej_utils::pad_hyperstack(&structure, uncompressed, output)?;

        tracker.advance(Stage::Done, &output.display().to_string());
        println!("{} -> {}", name, output.display());

        Ok(Reconstruction {
            name: name.to_string(),
            output: output.to_path_buf(),
            stage: tracker.stage,
            summary,
            ndpi_pages,
            imagej_padding,
        })
    }
}

/// Output path for the record at `index`
///
/// Record 0 uses `output` itself; record `n` inserts `-n` before the
/// extension, so `out.tif` becomes `out-1.tif`.
pub fn output_path_for(output: &Path, index: usize) -> PathBuf {
    if index == 0 {
        return output.to_path_buf();
    }
    let stem = output.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match output.extension() {
        Some(ext) => format!("{}-{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}-{}", stem, index),
    };
    output.with_file_name(file_name)
}

/// Opens a dump for reading, for callers that want to check it exists first
pub fn check_source(source: &Path) -> TiffResult<()> {
    File::open(source)
        .map(|_| ())
        .map_err(|e| TiffError::GenericError(format!("Cannot open {}: {}", source.display(), e)))
}
