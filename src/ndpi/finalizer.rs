//! NDPI finalization
//!
//! Hamamatsu NDPI files store their main pages as single JPEG streams with
//! restart markers, indexed by tag 65426. After the placeholder file is
//! written, each such page is re-encoded as JPEG, restart markers are added
//! by `jpegtran`, the stream is appended to the file, and the directory tree
//! is rewritten to point at it.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use log::{debug, info, warn};

use crate::ndpi::jpeg_markers;
use crate::ndpi::page::PagePixels;
use crate::tiff::constants::{compression, field_types, photometric, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::Ifd;
use crate::tiff::reader::TiffReader;
use crate::tiff::registry::TagClassifier;
use crate::tiff::writer::TiffWriter;

/// Whether an output path asks for NDPI finalization
pub fn is_ndpi_path(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "ndpi")
}

/// Converts NDPI pages of a written file into restart-marked JPEG pages
pub struct NdpiFinalizer<'a> {
    classifier: &'a dyn TagClassifier,
    jpegtran: PathBuf,
}

impl<'a> NdpiFinalizer<'a> {
    pub fn new(classifier: &'a dyn TagClassifier) -> Self {
        NdpiFinalizer { classifier, jpegtran: PathBuf::from("jpegtran") }
    }

    /// Uses a specific `jpegtran` executable
    pub fn with_jpegtran(mut self, jpegtran: impl Into<PathBuf>) -> Self {
        self.jpegtran = jpegtran.into();
        self
    }

    /// Finalizes `output` in place
    ///
    /// # Returns
    /// The number of pages converted
    pub fn finalize(&self, output: &Path) -> TiffResult<usize> {
        let mut structure = TiffReader::new(self.classifier).load(output)?;
        let scratch = tempfile::tempdir()?;
        let mut converted = 0;

        for (index, ifd) in structure.ifds.iter_mut().enumerate() {
            if !ifd.has_tag(tags::NDPI_MCU_STARTS) {
                continue;
            }
            let jpeg_path = scratch.path().join(format!("page_{}.jpeg", index));
            self.convert_page(ifd, output, &jpeg_path)?;
            converted += 1;
        }

        let size = fs::metadata(output)?.len();
        for ifd in structure.ifds.iter_mut() {
            ifd.size = size;
        }

        let mut temporary: OsString = output.as_os_str().to_owned();
        temporary.push(".ndpi");
        let temporary = PathBuf::from(temporary);

        let mut source = File::open(output)?;
        TiffWriter::new(self.classifier).write(&structure, &mut source, &temporary)?;
        drop(source);
        fs::rename(&temporary, output)?;

        info!("Converted {} NDPI pages in {}", converted, output.display());
        Ok(converted)
    }

    fn convert_page(&self, ifd: &mut Ifd, output: &Path, jpeg_path: &Path) -> TiffResult<()> {
        if ifd.has_tag(tags::TILE_OFFSETS) {
            return Err(TiffError::GenericError("NDPI pages must be stored in strips".to_string()));
        }
        let mcu_starts = ifd.get(tags::NDPI_MCU_STARTS).map(|record| record.data.len()).unwrap_or(0);
        if mcu_starts == 0 {
            return Err(TiffError::InvalidTagValue(tags::NDPI_MCU_STARTS, "no MCU starts to match".to_string()));
        }

        let pixels = PagePixels::decode(ifd, &mut File::open(output)?)?;
        pixels.write_jpeg(jpeg_path)?;

        let interval = (pixels.mcu_count() / mcu_starts as u64).max(1);
        let jpeg_start = fs::metadata(output)?.len();
        self.append_with_restarts(jpeg_path, interval, output)?;
        let jpeg_len = fs::metadata(output)?.len() - jpeg_start;
        if jpeg_len == 0 {
            return Err(TiffError::ExternalTool("jpegtran produced no output".to_string()));
        }

        let mut file = File::open(output)?;
        file.seek(SeekFrom::Start(jpeg_start))?;
        let starts = jpeg_markers::scan_mcu_starts(BufReader::new(file.take(jpeg_len)))?;
        if starts.len() != mcu_starts {
            warn!("Page has {} restart intervals; the dump listed {}", starts.len(), mcu_starts);
        }
        debug!("Appended {} JPEG bytes at {} with restart interval {}", jpeg_len, jpeg_start, interval);

        ifd.set_integers(tags::COMPRESSION, field_types::SHORT, vec![compression::JPEG as i64]);
        ifd.set_integers(tags::PHOTOMETRIC_INTERPRETATION, field_types::SHORT, vec![photometric::YCBCR as i64]);
        ifd.set_integers(tags::STRIP_OFFSETS, field_types::LONG, vec![jpeg_start as i64]);
        ifd.set_integers(tags::STRIP_BYTE_COUNTS, field_types::LONG, vec![jpeg_len as i64]);
        ifd.set_integers(tags::NDPI_MCU_STARTS, field_types::LONG, starts.iter().map(|&s| s as i64).collect());
        Ok(())
    }

    /// Runs `jpegtran -restart <n>B` with its output appended to `output`
    fn append_with_restarts(&self, jpeg_path: &Path, interval: u64, output: &Path) -> TiffResult<()> {
        let target = OpenOptions::new().append(true).open(output)?;
        let status = Command::new(&self.jpegtran)
            .arg("-restart")
            .arg(format!("{}B", interval))
            .arg(jpeg_path)
            .stdout(Stdio::from(target))
            .status()
            .map_err(|e| TiffError::ExternalTool(format!("cannot run {}: {}", self.jpegtran.display(), e)))?;

        if !status.success() {
            return Err(TiffError::ExternalTool(format!("{} exited with {}", self.jpegtran.display(), status)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ndpi_extension() {
        std::assert!(is_ndpi_path(Path::new("/tmp/slide.ndpi")));
        std::assert!(!is_ndpi_path(Path::new("/tmp/slide.tif")));
        std::assert!(!is_ndpi_path(Path::new("/tmp/ndpi")));
    }

    #[test]
    fn test_missing_jpegtran_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let jpeg = dir.path().join("in.jpeg");
        let out = dir.path().join("out.ndpi");
        std::fs::write(&jpeg, [0xFF, 0xD8]).unwrap();
        std::fs::write(&out, []).unwrap();

        let finalizer = NdpiFinalizer::new(crate::tiff::registry::default_registry())
            .with_jpegtran(dir.path().join("no-such-jpegtran"));
        std::assert!(matches!(
            finalizer.append_with_restarts(&jpeg, 1, &out),
            Err(TiffError::ExternalTool(_))
        ));
    }
}
