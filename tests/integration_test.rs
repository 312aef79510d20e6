//! End-to-end tests: dump text or JSON in, TIFF file out, read back

extern crate std;

use std::fs;
use std::path::{Path, PathBuf};

use ttdump::api::{Stage, TiffReconstructor};
use ttdump::compression::{CompressionHandler, PackBitsHandler};
use ttdump::layout::fill_byte;
use ttdump::tiff::constants::{field_types, tags};
use ttdump::tiff::registry::default_registry;
use ttdump::tiff::types::TiffStructure;
use ttdump::tiff::TiffReader;
use ttdump::utils::logger::Logger;

const GRAY_STRIPS: &str = "\
Header: 0x4949 <little-endian> <ClassicTIFF>
Directory 0: offset 8 (0x8)
  ImageWidth 256 (0x100) SHORT: 100
  ImageLength 257 (0x101) SHORT: 95
  BitsPerSample 258 (0x102) SHORT: 8
  Compression 259 (0x103) SHORT: 1
  Photometric 262 (0x106) SHORT: 1
  StripOffsets 273 (0x111) LONG: <10> 8 1008 2008 3008 4008 ...
  SamplesPerPixel 277 (0x115) SHORT: 1
  RowsPerStrip 278 (0x116) SHORT: 10
  StripByteCounts 279 (0x117) LONG: <10> 1000 1000 1000 1000 ...
";

const WITH_SUB_IFD: &str = "\
Header: 0x4949 <little-endian> <ClassicTIFF>
Directory 0: offset 8
  ImageWidth 256 (0x100) SHORT: 16
  ImageLength 257 (0x101) SHORT: 16
  BitsPerSample 258 (0x102) SHORT: 8
  StripOffsets 273 (0x111) LONG: 8
  RowsPerStrip 278 (0x116) SHORT: 16
  StripByteCounts 279 (0x117) LONG: 256
  SubIFD 330 (0x14A) IFD: 400
  SubIFD:0
    Directory 0,0: offset 400
      ImageWidth 256 (0x100) SHORT: 8
      ImageLength 257 (0x101) SHORT: 8
      BitsPerSample 258 (0x102) SHORT: 8
      StripOffsets 273 (0x111) LONG: 600
      RowsPerStrip 278 (0x116) SHORT: 8
      StripByteCounts 279 (0x117) LONG: 64
  Software 305 (0x131) ASCII: scanner 1.0
";

const GEO: &str = "\
Header: 0x4d4d <big-endian> <ClassicTIFF>
Directory 0: offset 8
  ImageWidth 256 (0x100) SHORT: 4
  ImageLength 257 (0x101) SHORT: 4
  BitsPerSample 258 (0x102) SHORT: 8
  StripOffsets 273 (0x111) LONG: 8
  RowsPerStrip 278 (0x116) SHORT: 4
  StripByteCounts 279 (0x117) LONG: 16
  GeoKeyDirectoryTag 34735 (0x87AF) SHORT: <24> 1 1 0 5 ...
    GTModelTypeGeoKey: 2 (ModelTypeGeographic)
    GTRasterTypeGeoKey: 1 (RasterPixelIsArea)
    GTCitationGeoKey: WGS 84
    GeographicTypeGeoKey: 4326 (GCS_WGS_84)
    GeogSemiMajorAxisGeoKey: 6378137.0
";

fn write_dump(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn rebuild(content: &str, compression: &str, out_name: &str) -> (tempfile::TempDir, PathBuf, TiffStructure) {
    let dir = tempfile::tempdir().unwrap();
    let source = write_dump(dir.path(), "dump.txt", content);
    let output = dir.path().join(out_name);

    let logger = Logger::disabled();
    let results = TiffReconstructor::new(&logger, compression).unwrap()
        .reconstruct(&source, &output)
        .unwrap();
    std::assert_eq!(results[0].stage, Stage::Done);

    let structure = TiffReader::new(default_registry()).load(&output).unwrap();
    (dir, output, structure)
}

fn chunk<'a>(file: &'a [u8], offset: i64, count: i64) -> &'a [u8] {
    &file[offset as usize..(offset + count) as usize]
}

#[test]
fn test_uncompressed_strip_layout() {
    let (_dir, output, structure) = rebuild(GRAY_STRIPS, "none", "gray.tif");
    let file = fs::read(&output).unwrap();
    std::assert_eq!(&file[..4], &[0x49, 0x49, 42, 0]);

    let ifd = structure.main_ifd().unwrap();
    let mut expected = vec![1000i64; 9];
    expected.push(500);
    std::assert_eq!(ifd.values(tags::STRIP_BYTE_COUNTS).unwrap(), &expected[..]);
    std::assert_eq!(ifd.first_value(tags::COMPRESSION), Some(1));

    let offsets = ifd.values(tags::STRIP_OFFSETS).unwrap();
    std::assert!(offsets[..9].iter().all(|&offset| offset == offsets[0]));
    std::assert!(chunk(&file, offsets[0], 1000).iter().all(|&b| b == fill_byte(1)));
    std::assert!(chunk(&file, offsets[9], 500).iter().all(|&b| b == fill_byte(2)));
}

#[test]
fn test_packbits_strip_layout() {
    let (_dir, output, structure) = rebuild(GRAY_STRIPS, "packbits", "gray.tif");
    let file = fs::read(&output).unwrap();

    let ifd = structure.main_ifd().unwrap();
    std::assert_eq!(ifd.first_value(tags::COMPRESSION), Some(32773));
    let counts = ifd.values(tags::STRIP_BYTE_COUNTS).unwrap();
    std::assert_eq!(counts[0], 16);
    std::assert_eq!(counts[9], 8);

    // 500 = 3 * 128 + 116
    let offsets = ifd.values(tags::STRIP_OFFSETS).unwrap();
    let last = chunk(&file, offsets[9], 8);
    std::assert_eq!(last[0], 0x81);
    std::assert_eq!(last[6], (257 - 116) as u8);

    let decoded = PackBitsHandler.decompress(chunk(&file, offsets[0], 16)).unwrap();
    std::assert_eq!(decoded.len(), 1000);
}

#[test]
fn test_float_samples_are_zero() {
    let dump = format!("{}  SampleFormat 339 (0x153) SHORT: 3\n", GRAY_STRIPS);
    let (_dir, output, structure) = rebuild(&dump, "none", "float.tif");
    let file = fs::read(&output).unwrap();

    let ifd = structure.main_ifd().unwrap();
    let offsets = ifd.values(tags::STRIP_OFFSETS).unwrap();
    std::assert!(chunk(&file, offsets[0], 1000).iter().all(|&b| b == 0));
    std::assert!(chunk(&file, offsets[9], 500).iter().all(|&b| b == 0));
}

#[test]
fn test_sub_ifd_follows_parent() {
    let (_dir, _output, structure) = rebuild(WITH_SUB_IFD, "none", "pyramid.tif");
    std::assert_eq!(structure.ifd_count(), 1);
    std::assert_eq!(structure.total_ifd_count(), 2);

    let parent = structure.main_ifd().unwrap();
    std::assert_eq!(parent.text(tags::SOFTWARE), Some("scanner 1.0"));

    let sub_ifd = parent.get(tags::SUB_IFD).unwrap();
    std::assert!(sub_ifd.datatype == field_types::IFD || sub_ifd.datatype == field_types::LONG);
    let child = &sub_ifd.ifds[0][0];
    std::assert_eq!(child.get_dimensions(), Some((8, 8)));

    let parent_chunk = parent.first_value(tags::STRIP_OFFSETS).unwrap();
    let child_chunk = child.first_value(tags::STRIP_OFFSETS).unwrap();
    std::assert!(child_chunk > parent_chunk);
    std::assert_eq!(child.first_value(tags::STRIP_BYTE_COUNTS), Some(64));
}

#[test]
fn test_exif_chain_gets_its_own_chunks() {
    let dump = "\
Header: 0x4949 <little-endian> <ClassicTIFF>
Directory 0: offset 8
  ImageWidth 256 (0x100) SHORT: 16
  ImageLength 257 (0x101) SHORT: 16
  BitsPerSample 258 (0x102) SHORT: 8
  StripOffsets 273 (0x111) LONG: 8
  RowsPerStrip 278 (0x116) SHORT: 16
  StripByteCounts 279 (0x117) LONG: 256
  EXIFIFD 34665 (0x8769) LONG: 300
  EXIFIFD:0
    Directory 0,0: offset 300
      ImageWidth 256 (0x100) SHORT: 4
      ImageLength 257 (0x101) SHORT: 4
      BitsPerSample 258 (0x102) SHORT: 8
      StripOffsets 273 (0x111) LONG: 400
      RowsPerStrip 278 (0x116) SHORT: 4
      StripByteCounts 279 (0x117) LONG: 16
";
    let (_dir, output, structure) = rebuild(dump, "none", "exif.tif");
    let file = fs::read(&output).unwrap();

    let parent = structure.main_ifd().unwrap();
    let exif = parent.get(tags::EXIF_IFD).unwrap();
    std::assert_eq!(exif.datatype, field_types::LONG);
    let child = &exif.ifds[0][0];
    std::assert_eq!(child.get_dimensions(), Some((4, 4)));

    let parent_chunk = parent.first_value(tags::STRIP_OFFSETS).unwrap();
    let child_chunk = child.first_value(tags::STRIP_OFFSETS).unwrap();
    std::assert!(child_chunk > parent_chunk);
    std::assert_eq!(child.first_value(tags::STRIP_BYTE_COUNTS), Some(16));
    let child_bytes = chunk(&file, child_chunk, 16);
    std::assert!(child_bytes.iter().all(|&b| b == child_bytes[0]));
}

#[test]
fn test_geo_keys_are_deterministic() {
    let (_first_dir, first, structure) = rebuild(GEO, "packbits", "geo.tif");
    let (_second_dir, second, _) = rebuild(GEO, "packbits", "geo.tif");
    std::assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());

    std::assert!(structure.big_endian);
    let ifd = structure.main_ifd().unwrap();
    let directory = ifd.values(tags::GEO_KEY_DIRECTORY_TAG).unwrap();
    std::assert_eq!(&directory[..4], &[1i64, 1, 1, 5][..]);
    std::assert_eq!(ifd.text(tags::GEO_ASCII_PARAMS_TAG), Some("WGS 84|"));
    std::assert!(ifd.has_tag(tags::GEO_DOUBLE_PARAMS_TAG));
}

#[test]
fn test_multiple_records_get_numbered_outputs() {
    let dump = format!("-- first.tif --\n{}-- second.tif --\n{}", GRAY_STRIPS, GEO);
    let dir = tempfile::tempdir().unwrap();
    let source = write_dump(dir.path(), "multi.txt", &dump);
    let output = dir.path().join("out.tif");

    let logger = Logger::disabled();
    let results = TiffReconstructor::new(&logger, "packbits").unwrap()
        .reconstruct(&source, &output)
        .unwrap();

    std::assert_eq!(results.len(), 2);
    std::assert_eq!(results[0].name, "first.tif");
    std::assert_eq!(results[1].output, dir.path().join("out-1.tif"));

    let second = TiffReader::new(default_registry()).load(&results[1].output).unwrap();
    std::assert!(second.big_endian);
}

#[test]
fn test_json_dump() {
    let json = r#"{
        "bigtiff": true,
        "ifds": [{"tags": {
            "ImageWidth": {"datatype": "SHORT", "data": [32]},
            "ImageLength": {"datatype": "SHORT", "data": [8]},
            "BitsPerSample": {"datatype": 3, "data": [8]},
            "StripOffsets": {"datatype": "LONG8", "count": 2, "data": [0, 0]},
            "RowsPerStrip": {"datatype": 3, "data": [4]},
            "StripByteCounts": {"datatype": "LONG8", "count": 2, "data": [128, 128]},
            "XResolution": {"datatype": "RATIONAL", "data": [[300, 1]]}
        }}]
    }"#;
    let (_dir, output, structure) = rebuild(json, "none", "json.tif");
    std::assert!(structure.big_tiff);
    std::assert_eq!(&fs::read(&output).unwrap()[2..4], &[43, 0]);

    let ifd = structure.main_ifd().unwrap();
    std::assert_eq!(ifd.values(tags::STRIP_BYTE_COUNTS).unwrap(), &[128i64, 128][..]);
    std::assert_eq!(ifd.values(282).unwrap(), &[300i64, 1][..]);
}

#[test]
fn test_imagej_stack_padding() {
    let dump = format!("{}  ImageDescription 270 (0x10E) ASCII: ImageJ=1.52a\nimages=3\nslices=3\n", GRAY_STRIPS);
    let (_dir, output, structure) = rebuild(&dump, "none", "stack.tif");
    let (_packed_dir, packed_output, _) = rebuild(&dump, "packbits", "stack.tif");

    let frame: i64 = structure.main_ifd().unwrap().values(tags::STRIP_BYTE_COUNTS).unwrap().iter().sum();
    let file = fs::read(&output).unwrap();
    std::assert!(file.len() as i64 > frame * 2);
    std::assert!(file[file.len() - (frame as usize * 2)..].iter().all(|&b| b == 0));

    std::assert!((fs::metadata(&packed_output).unwrap().len() as i64) < frame);
}

#[test]
fn test_truncated_dump_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_dump(dir.path(), "bad.txt", "Directory 0: offset 8\n  ImageWidth 256 (0x100) SHORT: 1\n");
    let logger = Logger::disabled();
    let result = TiffReconstructor::new(&logger, "none").unwrap()
        .reconstruct(&source, &dir.path().join("out.tif"));
    std::assert!(result.is_err());
    std::assert!(!dir.path().join("out.tif").exists());
}

const NDPI_PAGE: &str = "\
Header: 0x4949 <little-endian> <ClassicTIFF>
Directory 0: offset 8
  ImageWidth 256 (0x100) SHORT: 32
  ImageLength 257 (0x101) SHORT: 16
  BitsPerSample 258 (0x102) SHORT: 8
  Compression 259 (0x103) SHORT: 7
  Photometric 262 (0x106) SHORT: 1
  StripOffsets 273 (0x111) LONG: 8
  RowsPerStrip 278 (0x116) SHORT: 16
  StripByteCounts 279 (0x117) LONG: 9000
  NDPI_MCU_STARTS 65426 (0xFF92) LONG: <4> 0 100 200 300
";

/// Offset of the first entropy-coded byte, walking segment headers
fn scan_data_start(jpeg: &[u8]) -> usize {
    let mut pos = 2;
    loop {
        std::assert_eq!(jpeg[pos], 0xFF);
        let marker = jpeg[pos + 1];
        let length = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        pos += 2 + length;
        if marker == 0xDA {
            return pos;
        }
    }
}

#[cfg(unix)]
#[test]
fn test_ndpi_page_becomes_jpeg_strip() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    // stands in for jpegtran: copies the JPEG without adding restart markers
    let jpegtran = dir.path().join("jpegtran");
    fs::write(&jpegtran, "#!/bin/sh\ncat \"$3\"\n").unwrap();
    fs::set_permissions(&jpegtran, fs::Permissions::from_mode(0o755)).unwrap();

    let source = write_dump(dir.path(), "slide.txt", NDPI_PAGE);
    let output = dir.path().join("slide.ndpi");
    let logger = Logger::disabled();
    let results = TiffReconstructor::new(&logger, "packbits").unwrap()
        .with_jpegtran(jpegtran.clone())
        .reconstruct(&source, &output)
        .unwrap();
    std::assert_eq!(results[0].stage, Stage::Done);
    std::assert_eq!(results[0].ndpi_pages, 1);

    let structure = TiffReader::new(default_registry()).load(&output).unwrap();
    let page = structure.main_ifd().unwrap();
    std::assert_eq!(page.first_value(tags::COMPRESSION), Some(7));
    std::assert_eq!(page.first_value(tags::PHOTOMETRIC_INTERPRETATION), Some(6));

    let offsets = page.values(tags::STRIP_OFFSETS).unwrap();
    let counts = page.values(tags::STRIP_BYTE_COUNTS).unwrap();
    std::assert_eq!(offsets.len(), 1);
    std::assert_eq!(counts.len(), 1);

    let file = fs::read(&output).unwrap();
    let jpeg = chunk(&file, offsets[0], counts[0]);
    std::assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    std::assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);

    // one interval without restart markers, although four were dumped
    let starts = page.values(tags::NDPI_MCU_STARTS).unwrap();
    std::assert_eq!(starts, &[scan_data_start(jpeg) as i64][..]);
}

#[cfg(unix)]
#[test]
fn test_failing_jpegtran_stops_ndpi_output() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let jpegtran = dir.path().join("jpegtran");
    fs::write(&jpegtran, "#!/bin/sh\nexit 3\n").unwrap();
    fs::set_permissions(&jpegtran, fs::Permissions::from_mode(0o755)).unwrap();

    let source = write_dump(dir.path(), "slide.txt", NDPI_PAGE);
    let output = dir.path().join("slide.ndpi");
    let logger = Logger::disabled();
    let result = TiffReconstructor::new(&logger, "packbits").unwrap()
        .with_jpegtran(jpegtran)
        .reconstruct(&source, &output);
    std::assert!(matches!(result, Err(ttdump::tiff::TiffError::ExternalTool(_))));
}
