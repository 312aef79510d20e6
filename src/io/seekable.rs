//! Seekable reader trait
//!
//! The serializer copies placeholder chunks out of a scratch stream and the
//! reader walks IFD chains; both need to jump around their input, so they
//! take any reader that also seeks.

use std::io::{Read, Seek, SeekFrom};

/// Trait for readers that can both read and seek
pub trait SeekableReader: Read + Seek + Send + Sync {}

// Blanket implementation for any type that implements the required traits
impl<T: Read + Seek + Send + Sync> SeekableReader for T {}

/// Reads up to `buffer.len()` bytes at `offset`, returning how many were read
///
/// Stops early only at end of input, unlike a single `read` call which may
/// return a short count at any time.
pub fn read_at(reader: &mut dyn SeekableReader, offset: u64, buffer: &mut [u8]) -> std::io::Result<usize> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
