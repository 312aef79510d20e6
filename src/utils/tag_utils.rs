//! TIFF tag utilities
//!
//! Utilities for sizing, reading and encoding tag values.

use byteorder::ReadBytesExt;
use std::io::Write;

use crate::io::seekable::SeekableReader;
use crate::io::byte_order::ByteOrderHandler;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::TagData;
use crate::tiff::constants::field_types;

/// Size in bytes of one value of a field type
///
/// # Arguments
/// * `field_type` - The TIFF datatype code
///
/// # Returns
/// The element size, or an error for unknown datatypes
pub fn field_type_size(field_type: u16) -> TiffResult<u64> {
    match field_type {
        field_types::BYTE | field_types::ASCII | field_types::SBYTE | field_types::UNDEFINED => Ok(1),
        field_types::SHORT | field_types::SSHORT => Ok(2),
        field_types::LONG | field_types::SLONG | field_types::FLOAT | field_types::IFD => Ok(4),
        field_types::RATIONAL | field_types::SRATIONAL | field_types::DOUBLE |
        field_types::LONG8 | field_types::SLONG8 | field_types::IFD8 => Ok(8),
        _ => Err(TiffError::UnsupportedFieldType(field_type)),
    }
}

/// Determines if a tag's value fits in the entry's value field
///
/// # Arguments
/// * `field_type` - The TIFF datatype code
/// * `count` - Number of values
/// * `is_big_tiff` - Whether the file is BigTIFF format
///
/// # Returns
/// true if the value is stored inline, false if it's at an offset
pub fn is_value_inline(field_type: u16, count: u64, is_big_tiff: bool) -> TiffResult<bool> {
    let total_size = field_type_size(field_type)? * count;

    if is_big_tiff {
        Ok(total_size <= 8) // In BigTIFF, 8 bytes are available for inline storage
    } else {
        Ok(total_size <= 4) // In standard TIFF, 4 bytes are available for inline storage
    }
}

/// Get the name of a TIFF field type
///
/// # Arguments
/// * `field_type` - The field type ID to look up
///
/// # Returns
/// A string representing the field type name
pub fn get_field_type_name(field_type: u16) -> &'static str {
    match field_type {
        field_types::BYTE => "BYTE",
        field_types::ASCII => "ASCII",
        field_types::SHORT => "SHORT",
        field_types::LONG => "LONG",
        field_types::RATIONAL => "RATIONAL",
        field_types::SBYTE => "SBYTE",
        field_types::UNDEFINED => "UNDEFINED",
        field_types::SSHORT => "SSHORT",
        field_types::SLONG => "SLONG",
        field_types::SRATIONAL => "SRATIONAL",
        field_types::FLOAT => "FLOAT",
        field_types::DOUBLE => "DOUBLE",
        field_types::IFD => "IFD",
        field_types::LONG8 => "LONG8",
        field_types::SLONG8 => "SLONG8",
        field_types::IFD8 => "IFD8",
        _ => "Unknown",
    }
}

/// Reads `count` values of a field type into tag data
///
/// The reader must already be positioned at the first value.
///
/// # Arguments
/// * `reader` - The seekable reader to use
/// * `field_type` - The TIFF datatype code
/// * `count` - Number of values to read
/// * `handler` - The byte order handler
pub fn read_tag_data(
    reader: &mut dyn SeekableReader,
    field_type: u16,
    count: u64,
    handler: &dyn ByteOrderHandler
) -> TiffResult<TagData> {
    let capacity = count.min(1 << 20) as usize;

    let data = match field_type {
        field_types::ASCII => {
            let mut buffer = vec![0u8; count as usize];
            reader.read_exact(&mut buffer)?;
            while buffer.last() == Some(&0) {
                buffer.pop();
            }
            TagData::Ascii(String::from_utf8_lossy(&buffer).into_owned())
        },
        field_types::BYTE | field_types::UNDEFINED => {
            let mut buffer = vec![0u8; count as usize];
            reader.read_exact(&mut buffer)?;
            TagData::Bytes(buffer)
        },
        field_types::FLOAT | field_types::DOUBLE => {
            let mut values = Vec::with_capacity(capacity);
            for _ in 0..count {
                values.push(match field_type {
                    field_types::FLOAT => handler.read_f32(reader)? as f64,
                    _ => handler.read_f64(reader)?,
                });
            }
            TagData::Floats(values)
        },
        _ => {
            let mut values = Vec::with_capacity(capacity);
            for _ in 0..count {
                match field_type {
                    field_types::SBYTE => values.push(reader.read_i8()? as i64),
                    field_types::SHORT => values.push(handler.read_u16(reader)? as i64),
                    field_types::SSHORT => values.push(handler.read_u16(reader)? as i16 as i64),
                    field_types::LONG | field_types::IFD => values.push(handler.read_u32(reader)? as i64),
                    field_types::SLONG => values.push(handler.read_u32(reader)? as i32 as i64),
                    field_types::RATIONAL => {
                        let (num, den) = handler.read_rational(reader)?;
                        values.push(num as i64);
                        values.push(den as i64);
                    },
                    field_types::SRATIONAL => {
                        let (num, den) = handler.read_srational(reader)?;
                        values.push(num as i64);
                        values.push(den as i64);
                    },
                    field_types::LONG8 | field_types::SLONG8 | field_types::IFD8 => {
                        values.push(handler.read_u64(reader)? as i64)
                    },
                    _ => return Err(TiffError::UnsupportedFieldType(field_type)),
                }
            }
            TagData::Integers(values)
        },
    };

    Ok(data)
}

/// Encodes tag data as the bytes of a field type
///
/// ASCII output always ends in a NUL. Integer data stored under a float
/// type (and the reverse) is converted.
pub fn encode_tag_data(
    field_type: u16,
    data: &TagData,
    handler: &dyn ByteOrderHandler
) -> TiffResult<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();

    match (field_type, data) {
        (field_types::ASCII, TagData::Ascii(text)) => {
            out.extend_from_slice(text.as_bytes());
            if !text.ends_with('\0') {
                out.push(0);
            }
        },
        (_, TagData::Ascii(text)) => out.extend_from_slice(text.as_bytes()),
        (_, TagData::Bytes(bytes)) => match field_type {
            field_types::BYTE | field_types::SBYTE | field_types::UNDEFINED | field_types::ASCII => {
                out.extend_from_slice(bytes)
            },
            _ => {
                let values: Vec<i64> = bytes.iter().map(|&b| b as i64).collect();
                encode_numbers(&mut out, field_type, &values, &[], handler)?;
            },
        },
        (_, TagData::Integers(values)) => encode_numbers(&mut out, field_type, values, &[], handler)?,
        (_, TagData::Floats(values)) => encode_numbers(&mut out, field_type, &[], values, handler)?,
    }

    Ok(out)
}

fn encode_numbers(
    out: &mut dyn Write,
    field_type: u16,
    integers: &[i64],
    floats: &[f64],
    handler: &dyn ByteOrderHandler
) -> TiffResult<()> {
    let len = integers.len().max(floats.len());
    let int_at = |i: usize| integers.get(i).copied().unwrap_or_else(|| floats.get(i).map(|v| *v as i64).unwrap_or(0));
    let float_at = |i: usize| floats.get(i).copied().unwrap_or_else(|| integers.get(i).map(|v| *v as f64).unwrap_or(0.0));

    for i in 0..len {
        match field_type {
            field_types::BYTE | field_types::SBYTE | field_types::UNDEFINED | field_types::ASCII => {
                out.write_all(&[int_at(i) as u8])?
            },
            field_types::SHORT | field_types::SSHORT => handler.write_u16(out, int_at(i) as u16)?,
            field_types::LONG | field_types::SLONG | field_types::IFD |
            field_types::RATIONAL | field_types::SRATIONAL => handler.write_u32(out, int_at(i) as u32)?,
            field_types::FLOAT => handler.write_f32(out, float_at(i) as f32)?,
            field_types::DOUBLE => handler.write_f64(out, float_at(i))?,
            field_types::LONG8 | field_types::SLONG8 | field_types::IFD8 => handler.write_u64(out, int_at(i) as u64)?,
            _ => return Err(TiffError::UnsupportedFieldType(field_type)),
        }
    }

    Ok(())
}
