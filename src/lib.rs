pub mod io;
pub mod tiff;
pub mod utils;
pub mod compression;
pub mod layout;
pub mod dump;
pub mod ndpi;
pub mod commands;
pub mod api;

pub use crate::api::{output_path_for, Reconstruction, Stage, TiffReconstructor};

pub use tiff::{TiffReader, TiffWriter};
pub use dump::{load_records, parse_records};
