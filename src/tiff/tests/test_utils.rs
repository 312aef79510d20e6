use std::io::Cursor;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

/// Classic little-endian file: one IFD at 8 with a SubIFD pointing at a
/// second IFD at 50, and an out-of-line BitsPerSample at 68
pub fn create_test_tiff_buffer() -> Cursor<Vec<u8>> {
    let mut buffer = Vec::new();

    // TIFF header (little-endian)
    buffer.write_u16::<LittleEndian>(0x4949).unwrap(); // II for little-endian
    buffer.write_u16::<LittleEndian>(42).unwrap();     // TIFF magic number
    buffer.write_u32::<LittleEndian>(8).unwrap();      // IFD offset

    // IFD 0 (at offset 8)
    buffer.write_u16::<LittleEndian>(3).unwrap();      // Entry count

    // ImageWidth, LONG 800
    buffer.write_u16::<LittleEndian>(256).unwrap();
    buffer.write_u16::<LittleEndian>(4).unwrap();
    buffer.write_u32::<LittleEndian>(1).unwrap();
    buffer.write_u32::<LittleEndian>(800).unwrap();

    // BitsPerSample, SHORT x3 stored at 68
    buffer.write_u16::<LittleEndian>(258).unwrap();
    buffer.write_u16::<LittleEndian>(3).unwrap();
    buffer.write_u32::<LittleEndian>(3).unwrap();
    buffer.write_u32::<LittleEndian>(68).unwrap();

    // SubIFD, IFD pointing at 50
    buffer.write_u16::<LittleEndian>(330).unwrap();
    buffer.write_u16::<LittleEndian>(13).unwrap();
    buffer.write_u32::<LittleEndian>(1).unwrap();
    buffer.write_u32::<LittleEndian>(50).unwrap();

    buffer.write_u32::<LittleEndian>(0).unwrap();      // Next IFD offset

    // IFD 0.SubIFD:0 (at offset 50)
    buffer.write_u16::<LittleEndian>(1).unwrap();
    buffer.write_u16::<LittleEndian>(256).unwrap();    // ImageWidth, SHORT 400
    buffer.write_u16::<LittleEndian>(3).unwrap();
    buffer.write_u32::<LittleEndian>(1).unwrap();
    buffer.write_u16::<LittleEndian>(400).unwrap();
    buffer.write_u16::<LittleEndian>(0).unwrap();
    buffer.write_u32::<LittleEndian>(0).unwrap();

    // BitsPerSample values (at offset 68)
    for _ in 0..3 {
        buffer.write_u16::<LittleEndian>(8).unwrap();
    }

    Cursor::new(buffer)
}

/// Big-endian BigTIFF file with two chained IFDs, the second linking back
/// to the first
pub fn create_test_bigtiff_buffer() -> Cursor<Vec<u8>> {
    let mut buffer = Vec::new();

    // BigTIFF header (big-endian)
    buffer.write_u16::<BigEndian>(0x4D4D).unwrap();    // MM for big-endian
    buffer.write_u16::<BigEndian>(43).unwrap();        // BigTIFF version
    buffer.write_u16::<BigEndian>(8).unwrap();         // Offset size
    buffer.write_u16::<BigEndian>(0).unwrap();         // Reserved
    buffer.write_u64::<BigEndian>(16).unwrap();        // IFD offset

    // IFD 0 (at offset 16)
    buffer.write_u64::<BigEndian>(1).unwrap();
    buffer.write_u16::<BigEndian>(256).unwrap();       // ImageWidth, LONG8
    buffer.write_u16::<BigEndian>(16).unwrap();
    buffer.write_u64::<BigEndian>(1).unwrap();
    buffer.write_u64::<BigEndian>(1024).unwrap();
    buffer.write_u64::<BigEndian>(52).unwrap();        // Next IFD offset

    // IFD 1 (at offset 52)
    buffer.write_u64::<BigEndian>(1).unwrap();
    buffer.write_u16::<BigEndian>(257).unwrap();       // ImageLength, LONG
    buffer.write_u16::<BigEndian>(4).unwrap();
    buffer.write_u64::<BigEndian>(1).unwrap();
    buffer.write_u32::<BigEndian>(768).unwrap();
    buffer.write_u32::<BigEndian>(0).unwrap();
    buffer.write_u64::<BigEndian>(16).unwrap();        // Loops back to IFD 0

    Cursor::new(buffer)
}
