//! ImageJ hyperstack utilities
//!
//! ImageJ writes multi-image stacks as a single IFD whose description says
//! how many images follow. Readers locate the later frames by assuming they
//! sit contiguously after the first, so a reconstructed stack needs those
//! bytes present.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;

use crate::tiff::constants::tags;
use crate::tiff::errors::TiffResult;
use crate::tiff::types::TiffStructure;
use crate::utils::write_utils;

lazy_static! {
    static ref IMAGES_RE: Regex = Regex::new(r"(?m)^images=\s*([0-9]+)\s*$").expect("valid regex");
}

/// Number of images declared by an ImageJ description
pub fn declared_images(description: &str) -> Option<u64> {
    if !description.starts_with("ImageJ") {
        return None;
    }
    IMAGES_RE.captures(description)?.get(1)?.as_str().parse().ok()
}

/// Bytes of frame data missing after the first frame of an ImageJ stack
///
/// Only uncompressed single-IFD files qualify; anything else yields `None`.
pub fn missing_frame_bytes(structure: &TiffStructure, uncompressed: bool) -> Option<u64> {
    if !uncompressed || structure.ifds.len() != 1 {
        return None;
    }
    let ifd = structure.main_ifd()?;
    let images = declared_images(ifd.text(tags::IMAGE_DESCRIPTION)?)?;
    if images <= 1 {
        return None;
    }
    let frame: i64 = ifd.values(tags::STRIP_BYTE_COUNTS)?.iter().sum();
    Some(frame.max(0) as u64 * (images - 1))
}

/// Appends zeroed frames to `output` when it is an ImageJ stack
///
/// # Returns
/// The number of bytes appended
pub fn pad_hyperstack(structure: &TiffStructure, uncompressed: bool, output: &Path) -> TiffResult<u64> {
    let count = match missing_frame_bytes(structure, uncompressed) {
        Some(count) if count > 0 => count,
        _ => {
            debug!("{} is not an uncompressed ImageJ stack", output.display());
            return Ok(0);
        },
    };

    let mut writer = BufWriter::new(OpenOptions::new().append(true).open(output)?);
    write_utils::write_repeated(&mut writer, 0, count)?;
    writer.flush()?;
    info!("Appended {} bytes of ImageJ frames to {}", count, output.display());
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiff::constants::field_types;
    use crate::tiff::ifd::{Ifd, TagRecord};

    fn stack(description: &str, counts: Vec<i64>) -> TiffStructure {
        let mut ifd = Ifd::new();
        ifd.insert(tags::IMAGE_DESCRIPTION, TagRecord::ascii(description));
        ifd.insert(tags::STRIP_BYTE_COUNTS, TagRecord::integers(field_types::LONG, counts));
        let mut structure = TiffStructure::new(false, false);
        structure.ifds.push(ifd);
        structure
    }

    #[test]
    fn test_declared_images() {
        std::assert_eq!(declared_images("ImageJ=1.52\nimages=12\nslices=12\n"), Some(12));
        std::assert_eq!(declared_images("ImageJ=1.52\nslices=12\n"), None);
        std::assert_eq!(declared_images("Aperio\nimages=3\n"), None);
    }

    #[test]
    fn test_missing_frames() {
        let structure = stack("ImageJ=1.52\nimages=3\n", vec![100, 50]);
        std::assert_eq!(missing_frame_bytes(&structure, true), Some(300));
        std::assert_eq!(missing_frame_bytes(&structure, false), None);

        let single = stack("ImageJ=1.52\nimages=1\n", vec![100]);
        std::assert_eq!(missing_frame_bytes(&single, true), None);
    }

    #[test]
    fn test_pad_appends_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.tif");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let structure = stack("ImageJ=1.52\nimages=2\n", vec![5]);
        std::assert_eq!(pad_hyperstack(&structure, true, &path).unwrap(), 5);
        std::assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 0, 0, 0, 0, 0]);

        std::assert_eq!(pad_hyperstack(&structure, false, &path).unwrap(), 0);
    }
}
