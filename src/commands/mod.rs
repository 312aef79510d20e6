//! CLI command implementations
//!
//! This module contains the commands supported by the CLI application,
//! using the Command pattern.

pub mod command_traits;
pub mod reconstruct_command;

pub use command_traits::{Command, CommandFactory};
pub use reconstruct_command::ReconstructCommand;

use clap::ArgMatches;
use crate::utils::logger::Logger;
use crate::tiff::errors::TiffResult;

/// Factory for creating command instances based on CLI arguments
pub struct TtdumpCommandFactory;

impl TtdumpCommandFactory {
    /// Create a new factory instance
    pub fn new() -> Self {
        TtdumpCommandFactory
    }
}

impl Default for TtdumpCommandFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> CommandFactory<'a> for TtdumpCommandFactory {
    fn create_command(&self, args: &ArgMatches, logger: &'a Logger) -> TiffResult<Box<dyn Command + 'a>> {
        // reconstruction is the only operation
        Ok(Box::new(ReconstructCommand::new(args, logger)?))
    }
}
