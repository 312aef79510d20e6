//! Tag value decoding for dump lines
//!
//! The dumper prints BYTE/UNDEFINED values either as quoted string literals
//! (with backslash escapes, optionally `b`-prefixed) or as space-separated
//! integers, and all other numeric types as whitespace-separated tokens that
//! may be followed by a parenthesized description or a `...` truncation mark.

use crate::tiff::constants::field_types;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::TagData;

/// Marker the dumper appends to a shortened quoted value
const TRUNCATED_LITERAL: &str = "' ...";

/// Decodes a BYTE or UNDEFINED value
pub fn parse_byte_value(tag: u16, value: &str) -> TiffResult<Vec<u8>> {
    let value = match value.find(TRUNCATED_LITERAL) {
        Some(pos) => format!("{}'", &value[..pos]),
        None => value.to_string(),
    };

    if value.starts_with('\'') || value.starts_with("b'") || value.starts_with('"') || value.starts_with("b\"") {
        return parse_quoted_literal(&value)
            .ok_or_else(|| TiffError::InvalidTagValue(tag, format!("Bad quoted value: {}", value)));
    }

    value.split(' ')
        .filter(|token| !token.is_empty() && *token != "...")
        .map(|token| token.parse::<i64>()
            .map(|v| v as u8)
            .map_err(|_| TiffError::InvalidTagValue(tag, format!("Bad byte value '{}'", token))))
        .collect()
}

/// Decodes a quoted literal with backslash escapes into bytes
///
/// A `b` prefix marks a byte literal, where every character is one byte.
/// Without it, characters above `\xff` are stored as UTF-8.
pub fn parse_quoted_literal(literal: &str) -> Option<Vec<u8>> {
    let (is_bytes, rest) = match literal.strip_prefix('b') {
        Some(rest) => (true, rest),
        None => (false, literal),
    };

    let quote = rest.chars().next()?;
    if (quote != '\'' && quote != '"') || rest.len() < 2 || !rest.ends_with(quote) {
        return None;
    }
    let body = &rest[1..rest.len() - 1];

    let mut out = Vec::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            push_char(&mut out, c, is_bytes);
            continue;
        }

        let escaped = chars.next()?;
        match escaped {
            '\\' => out.push(b'\\'),
            '\'' => out.push(b'\''),
            '"' => out.push(b'"'),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'v' => out.push(0x0b),
            '\n' => {},
            '0'..='7' => {
                let mut value = escaped.to_digit(8)?;
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        },
                        None => break,
                    }
                }
                push_code(&mut out, value, is_bytes)?;
            },
            'x' => push_code(&mut out, take_hex(&mut chars, 2)?, is_bytes)?,
            'u' if !is_bytes => push_code(&mut out, take_hex(&mut chars, 4)?, false)?,
            'U' if !is_bytes => push_code(&mut out, take_hex(&mut chars, 8)?, false)?,
            other => {
                out.push(b'\\');
                push_char(&mut out, other, is_bytes);
            },
        }
    }

    Some(out)
}

fn take_hex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, digits: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..digits {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}

fn push_char(out: &mut Vec<u8>, c: char, _is_bytes: bool) {
    let code = c as u32;
    if code < 0x100 {
        out.push(code as u8);
    } else {
        let mut buffer = [0u8; 4];
        out.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
    }
}

fn push_code(out: &mut Vec<u8>, code: u32, is_bytes: bool) -> Option<()> {
    if code < 0x100 {
        out.push(code as u8);
        return Some(());
    }
    if is_bytes {
        return None;
    }
    push_char(out, char::from_u32(code)?, false);
    Some(())
}

/// Decodes the value of a numeric tag
///
/// Takes the first `count` tokens (twice that for rationals), drops
/// descriptive tokens and truncation marks, and repeats what remains to fill
/// `count` when the dumper shortened the list.
pub fn parse_numeric_value(tag: u16, datatype: u16, count: u64, value: &str) -> TiffResult<TagData> {
    let wanted = if datatype == field_types::RATIONAL || datatype == field_types::SRATIONAL {
        count as usize * 2
    } else {
        count as usize
    };

    let tokens: Vec<&str> = value.split_whitespace()
        .take(wanted)
        .filter(|token| !token.contains('(') && !token.contains("..."))
        .collect();

    if datatype == field_types::FLOAT || datatype == field_types::DOUBLE {
        let values = tokens.iter()
            .map(|token| token.parse::<f64>()
                .map_err(|_| TiffError::InvalidTagValue(tag, format!("Bad float value '{}'", token))))
            .collect::<TiffResult<Vec<f64>>>()?;
        Ok(TagData::Floats(fill_to(values, wanted)))
    } else {
        let values = tokens.iter()
            .map(|token| token.parse::<i64>()
                .map_err(|_| TiffError::InvalidTagValue(tag, format!("Bad integer value '{}'", token))))
            .collect::<TiffResult<Vec<i64>>>()?;
        Ok(TagData::Integers(fill_to(values, wanted)))
    }
}

/// Repeats a non-empty list until it holds `wanted` values
fn fill_to<T: Clone>(mut values: Vec<T>, wanted: usize) -> Vec<T> {
    if values.is_empty() {
        return values;
    }
    while values.len() < wanted {
        let copy = values.clone();
        values.extend(copy);
    }
    values.truncate(wanted);
    values
}
