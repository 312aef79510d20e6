//! Dump reconstruction command
//!
//! Rebuilds the TIFF files described by a `tifftools dump` listing.

use std::path::PathBuf;
use clap::ArgMatches;
use log::info;

use crate::api::{self, TiffReconstructor};
use crate::commands::command_traits::Command;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::utils::logger::Logger;

/// Command for rebuilding files from a dump
pub struct ReconstructCommand<'a> {
    /// Path to the dump
    source: PathBuf,
    /// Path of the first output file
    output: PathBuf,
    /// Placeholder compression name
    compression: String,
    /// Whether to draw progress bars
    show_progress: bool,
    /// Run log for stage records
    logger: &'a Logger,
}

impl<'a> ReconstructCommand<'a> {
    /// Create a new reconstruct command
    ///
    /// # Arguments
    /// * `args` - CLI argument matches from clap
    /// * `logger` - Run log for stage records
    ///
    /// # Returns
    /// A new ReconstructCommand instance or an error
    pub fn new(args: &ArgMatches, logger: &'a Logger) -> TiffResult<Self> {
        let source = args.get_one::<String>("source")
            .ok_or_else(|| TiffError::GenericError("Missing source dump".to_string()))?;
        let output = args.get_one::<String>("out")
            .ok_or_else(|| TiffError::GenericError("Missing output file".to_string()))?;
        let compression = args.get_one::<String>("compression")
            .cloned()
            .unwrap_or_else(|| "packbits".to_string());

        let source = PathBuf::from(source);
        api::check_source(&source)?;

        Ok(ReconstructCommand {
            source,
            output: PathBuf::from(output),
            compression,
            show_progress: args.get_flag("progress"),
            logger,
        })
    }
}

impl<'a> Command for ReconstructCommand<'a> {
    fn execute(&self) -> TiffResult<()> {
        info!("Rebuilding {} into {} with {} placeholders",
              self.source.display(), self.output.display(), self.compression);

        let reconstructor = TiffReconstructor::new(self.logger, &self.compression)?
            .with_progress(self.show_progress);
        let results = reconstructor.reconstruct(&self.source, &self.output)?;

        info!("Wrote {} files", results.len());
        Ok(())
    }
}
