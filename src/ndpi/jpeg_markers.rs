//! JPEG marker scanning for NDPI restart tables
//!
//! NDPI pages store, in tag 65426, the offset of every restart interval in
//! the page's JPEG stream. The scan walks the segment headers up to the
//! start of scan, then the entropy-coded data, recording where each
//! interval begins.

use std::io::{ErrorKind, Read};
use log::debug;

use crate::tiff::errors::{TiffError, TiffResult};

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const TEM: u8 = 0x01;

fn is_restart(marker: u8) -> bool {
    (0xD0..=0xD7).contains(&marker)
}

/// Byte reader that tracks how far into the stream it is
struct MarkerReader<R: Read> {
    inner: R,
    position: u64,
}

impl<R: Read> MarkerReader<R> {
    fn next_byte(&mut self) -> TiffResult<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.position += 1;
                    return Ok(Some(byte[0]));
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn require_byte(&mut self) -> TiffResult<u8> {
        self.next_byte()?.ok_or_else(|| mismatch(self.position, "stream ends inside a segment"))
    }

    /// Reads a marker code, skipping `FF` fill bytes
    fn marker(&mut self) -> TiffResult<u8> {
        if self.require_byte()? != 0xFF {
            return Err(mismatch(self.position, "expected a marker"));
        }
        let mut code = self.require_byte()?;
        while code == 0xFF {
            code = self.require_byte()?;
        }
        Ok(code)
    }

    fn skip_segment(&mut self) -> TiffResult<u64> {
        let length = (self.require_byte()? as u64) << 8 | self.require_byte()? as u64;
        if length < 2 {
            return Err(mismatch(self.position, "segment length below 2"));
        }
        for _ in 0..length - 2 {
            self.require_byte()?;
        }
        Ok(length)
    }
}

fn mismatch(position: u64, message: &str) -> TiffError {
    TiffError::GenericError(format!("JPEG restart scan failed at byte {}: {}", position, message))
}

/// Finds the start of every restart interval in a baseline JPEG stream
///
/// The first entry is where the entropy-coded data begins (just past the
/// SOS segment); each further entry is just past an RST0-RST7 marker.
/// Offsets are relative to the start of the stream.
pub fn scan_mcu_starts<R: Read>(input: R) -> TiffResult<Vec<u64>> {
    let mut reader = MarkerReader { inner: input, position: 0 };

    if reader.marker()? != SOI {
        return Err(mismatch(reader.position, "stream does not start with SOI"));
    }

    loop {
        match reader.marker()? {
            SOS => {
                reader.skip_segment()?;
                break;
            },
            EOI => return Err(mismatch(reader.position, "EOI before any scan")),
            marker if marker == TEM || is_restart(marker) => {},
            _ => {
                reader.skip_segment()?;
            },
        }
    }

    let mut starts = vec![reader.position];
    loop {
        let byte = match reader.next_byte()? {
            Some(byte) => byte,
            None => return Err(mismatch(reader.position, "stream ends without EOI")),
        };
        if byte != 0xFF {
            continue;
        }

        let mut code = reader.require_byte()?;
        while code == 0xFF {
            code = reader.require_byte()?;
        }
        match code {
            0x00 => {},
            EOI => break,
            code if is_restart(code) => starts.push(reader.position),
            code => return Err(mismatch(reader.position, &format!("unexpected marker FF{:02X} in scan data", code))),
        }
    }

    debug!("Found {} restart intervals in {} JPEG bytes", starts.len(), reader.position);
    Ok(starts)
}
