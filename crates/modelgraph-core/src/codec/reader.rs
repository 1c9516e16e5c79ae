//! Reader backings.

use super::{CodecError, Reader};
use crate::primitives::MAX_ARRAY_LENGTH;
use std::io::{self, Read, Seek, SeekFrom};

/// Upper bound on the scratch buffer used to discard skipped stream bytes.
const SKIP_CHUNK: usize = 8 * 1024;

/// Fill `buf` from `inner`, reporting how far it got on early EOF.
fn read_fully<R: Read>(inner: &mut R, buf: &mut [u8], offset: u64) -> Result<(), CodecError> {
    let mut filled = 0;
    while filled < buf.len() {
        match inner.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(CodecError::UnexpectedEnd {
                    offset,
                    requested: buf.len() as u64,
                    available: filled as u64,
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

// =============================================================================
// BORROWED BYTES
// =============================================================================

/// Reader over a borrowed byte slice.
///
/// Strings and byte arrays can be read without copying through
/// [`SliceReader::read_str`] and [`SliceReader::read_byte_array_slice`].
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
    max_length: u32,
}

impl<'a> SliceReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            max_length: MAX_ARRAY_LENGTH,
        }
    }

    /// Reject length prefixes above `max_length`.
    #[must_use]
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Borrow the next `count` bytes.
    pub fn read_slice(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        if count > self.remaining() {
            return Err(CodecError::UnexpectedEnd {
                offset: self.pos as u64,
                requested: count as u64,
                available: self.remaining() as u64,
            });
        }
        let data: &'a [u8] = self.data;
        let slice = &data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// Borrow a length-prefixed byte array.
    pub fn read_byte_array_slice(&mut self) -> Result<&'a [u8], CodecError> {
        let length = self.read_length()?;
        self.read_slice(length)
    }

    /// Borrow a length-prefixed string.
    pub fn read_str(&mut self) -> Result<&'a str, CodecError> {
        let offset = self.pos as u64;
        let bytes = self.read_byte_array_slice()?;
        std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8 { offset })
    }
}

impl Reader for SliceReader<'_> {
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<(), CodecError> {
        let slice = self.read_slice(buf.len())?;
        buf.copy_from_slice(slice);
        Ok(())
    }

    fn skip_bytes(&mut self, count: u64) -> Result<(), CodecError> {
        self.read_slice(count as usize).map(|_| ())
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn remaining_hint(&self) -> Option<u64> {
        Some(self.remaining() as u64)
    }

    fn max_length(&self) -> u32 {
        self.max_length
    }

    fn read_byte_array(&mut self) -> Result<Vec<u8>, CodecError> {
        self.read_byte_array_slice().map(<[u8]>::to_vec)
    }

    fn read_string(&mut self) -> Result<String, CodecError> {
        self.read_str().map(str::to_owned)
    }
}

// =============================================================================
// STREAM
// =============================================================================

/// Reader over any [`io::Read`] source.
///
/// Skips read and discard in bounded chunks.
#[derive(Debug)]
pub struct StreamReader<R: Read> {
    inner: R,
    position: u64,
    max_length: u32,
}

impl<R: Read> StreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            position: 0,
            max_length: MAX_ARRAY_LENGTH,
        }
    }

    #[must_use]
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Reader for StreamReader<R> {
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<(), CodecError> {
        read_fully(&mut self.inner, buf, self.position)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn skip_bytes(&mut self, count: u64) -> Result<(), CodecError> {
        let start = self.position;
        let mut scratch = [0u8; SKIP_CHUNK];
        let mut remaining = count;
        while remaining > 0 {
            let chunk = remaining.min(SKIP_CHUNK as u64) as usize;
            match self.inner.read(&mut scratch[..chunk]) {
                Ok(0) => {
                    return Err(CodecError::UnexpectedEnd {
                        offset: start,
                        requested: count,
                        available: count - remaining,
                    });
                }
                Ok(n) => {
                    remaining -= n as u64;
                    self.position += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn max_length(&self) -> u32 {
        self.max_length
    }
}

// =============================================================================
// SEEKABLE CHANNEL
// =============================================================================

/// Reader over a seekable source such as a file.
///
/// The total length is taken once at construction, so skips are
/// bounds-checked and performed as a single seek.
#[derive(Debug)]
pub struct SeekReader<R: Read + Seek> {
    inner: R,
    position: u64,
    len: u64,
    max_length: u32,
}

impl<R: Read + Seek> SeekReader<R> {
    /// Wrap `inner`, reading from its current position.
    pub fn new(mut inner: R) -> Result<Self, CodecError> {
        let position = inner.stream_position()?;
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(position))?;
        Ok(Self {
            inner,
            position,
            len,
            max_length: MAX_ARRAY_LENGTH,
        })
    }

    #[must_use]
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> Reader for SeekReader<R> {
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<(), CodecError> {
        self.check_available(buf.len() as u64)?;
        read_fully(&mut self.inner, buf, self.position)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn skip_bytes(&mut self, count: u64) -> Result<(), CodecError> {
        self.check_available(count)?;
        self.inner.seek(SeekFrom::Current(count as i64))?;
        self.position += count;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn remaining_hint(&self) -> Option<u64> {
        Some(self.len.saturating_sub(self.position))
    }

    fn max_length(&self) -> u32 {
        self.max_length
    }
}
