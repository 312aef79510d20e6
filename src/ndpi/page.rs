//! Placeholder page decoding and JPEG encoding

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, RgbImage};
use log::{debug, warn};

use crate::compression::CompressionFactory;
use crate::io::seekable::{self, SeekableReader};
use crate::tiff::constants::{compression, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::Ifd;

/// Quality the page is encoded at before restart markers are added
pub const JPEG_QUALITY: u8 = 95;

/// Decoded 8-bit pixels of one page
#[derive(Debug, Clone)]
pub struct PagePixels {
    pub width: u32,
    pub height: u32,
    pub samples: u16,
    pub data: Vec<u8>,
}

impl PagePixels {
    /// Reads and decodes the strips of a placeholder page
    ///
    /// Only 8-bit chunky pages with 1 or 3 samples, stored uncompressed or
    /// as PackBits, can be decoded.
    pub fn decode(ifd: &Ifd, source: &mut dyn SeekableReader) -> TiffResult<Self> {
        let (width, height) = ifd.get_dimensions()
            .ok_or_else(|| TiffError::MissingGeometryTag(tags::IMAGE_WIDTH, "ImageWidth/ImageLength".to_string()))?;
        let samples = ifd.get_samples_per_pixel();

        if samples != 1 && samples != 3 {
            return Err(TiffError::GenericError(format!("Cannot encode a {}-sample page as JPEG", samples)));
        }
        if ifd.values(tags::BITS_PER_SAMPLE).map_or(true, |bits| bits.iter().any(|&b| b != 8)) {
            return Err(TiffError::GenericError("JPEG pages must have 8 bits per sample".to_string()));
        }
        if ifd.first_value(tags::PLANAR_CONFIGURATION).unwrap_or(1) != 1 {
            return Err(TiffError::GenericError("JPEG pages must be stored chunky".to_string()));
        }

        let offsets = ifd.values(tags::STRIP_OFFSETS)
            .ok_or_else(|| TiffError::GenericError("JPEG pages must be stored in strips".to_string()))?;
        let counts = ifd.values(tags::STRIP_BYTE_COUNTS)
            .ok_or_else(|| TiffError::MissingGeometryTag(tags::STRIP_BYTE_COUNTS, "StripByteCounts".to_string()))?;
        let code = ifd.first_value(tags::COMPRESSION).unwrap_or(compression::NONE as i64);
        let codec = CompressionFactory::create_handler(code as u64)?;

        let expected = (width * height * samples) as usize;
        let mut data = Vec::with_capacity(expected);
        for (&offset, &count) in offsets.iter().zip(counts.iter()) {
            let mut stored = vec![0u8; count.max(0) as usize];
            let read = seekable::read_at(source, offset.max(0) as u64, &mut stored)?;
            stored.truncate(read);
            data.extend(codec.decompress(&stored)?);
        }

        if data.len() != expected {
            warn!("Page decoded to {} bytes, expected {}; adjusting", data.len(), expected);
            data.resize(expected, 0);
        }
        debug!("Decoded {}x{} page with {} samples using {}", width, height, samples, codec.name());

        Ok(PagePixels {
            width: width as u32,
            height: height as u32,
            samples: samples as u16,
            data,
        })
    }

    /// Number of 8x8 MCUs covering the page
    pub fn mcu_count(&self) -> u64 {
        ((self.width as u64 + 7) / 8) * ((self.height as u64 + 7) / 8)
    }

    /// Encodes the page as a baseline JPEG file
    pub fn write_jpeg(&self, path: &Path) -> TiffResult<()> {
        let image = match self.samples {
            1 => GrayImage::from_raw(self.width, self.height, self.data.clone()).map(DynamicImage::ImageLuma8),
            _ => RgbImage::from_raw(self.width, self.height, self.data.clone()).map(DynamicImage::ImageRgb8),
        }
        .ok_or_else(|| TiffError::GenericError("Page buffer does not match its dimensions".to_string()))?;

        let mut writer = BufWriter::new(File::create(path)?);
        image.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY))?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use crate::tiff::constants::field_types;
    use crate::tiff::ifd::TagRecord;

    fn page(compression_code: i64, offsets: Vec<i64>, counts: Vec<i64>) -> Ifd {
        let mut ifd = Ifd::new();
        ifd.insert(tags::IMAGE_WIDTH, TagRecord::integers(field_types::SHORT, vec![4]));
        ifd.insert(tags::IMAGE_LENGTH, TagRecord::integers(field_types::SHORT, vec![2]));
        ifd.insert(tags::BITS_PER_SAMPLE, TagRecord::integers(field_types::SHORT, vec![8]));
        ifd.insert(tags::COMPRESSION, TagRecord::integers(field_types::SHORT, vec![compression_code]));
        ifd.insert(tags::STRIP_OFFSETS, TagRecord::integers(field_types::LONG, offsets));
        ifd.insert(tags::STRIP_BYTE_COUNTS, TagRecord::integers(field_types::LONG, counts));
        ifd
    }

    #[test]
    fn test_decode_packbits_page() {
        // two strips, each one row of four 0x7f bytes
        let mut source = Cursor::new(vec![0xFD, 0x7F]);
        let ifd = page(compression::PACKBITS as i64, vec![0, 0], vec![2, 2]);
        let pixels = PagePixels::decode(&ifd, &mut source).unwrap();
        std::assert_eq!(pixels.data, vec![0x7F; 8]);
        std::assert_eq!(pixels.mcu_count(), 1);
    }

    #[test]
    fn test_rejects_unsupported_pages() {
        let mut ifd = page(compression::NONE as i64, vec![0], vec![8]);
        ifd.insert(tags::BITS_PER_SAMPLE, TagRecord::integers(field_types::SHORT, vec![16]));
        std::assert!(PagePixels::decode(&ifd, &mut Cursor::new(vec![0u8; 8])).is_err());

        let ifd = page(5, vec![0], vec![8]);
        std::assert!(matches!(
            PagePixels::decode(&ifd, &mut Cursor::new(vec![0u8; 8])),
            Err(TiffError::UnsupportedCompression(5))
        ));
    }

    #[test]
    fn test_jpeg_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.jpeg");
        let pixels = PagePixels { width: 16, height: 8, samples: 3, data: vec![200; 16 * 8 * 3] };
        pixels.write_jpeg(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        std::assert_eq!(pixels.mcu_count(), 2);
    }
}
