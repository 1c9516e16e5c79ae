//! Writer backings.

use super::{CodecError, Writer};
use std::io::{self, Write};

// =============================================================================
// GROWABLE BUFFER
// =============================================================================

/// Writer over a growable in-memory buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferWriter {
    buf: Vec<u8>,
}

impl BufferWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop the contents but keep the allocation for reuse.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl Writer for BufferWriter {
    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }
}

// =============================================================================
// FIXED WINDOW
// =============================================================================

/// Writer over a fixed, caller-owned byte window.
///
/// Writing past the end of the window fails with an I/O `WriteZero` error
/// and leaves the window untouched from that point on.
#[derive(Debug)]
pub struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> SliceWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes written into the window.
    #[must_use]
    pub fn written(&self) -> usize {
        self.pos
    }
}

impl Writer for SliceWriter<'_> {
    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(CodecError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                format!(
                    "window full: {} bytes requested, {} free",
                    bytes.len(),
                    self.buf.len() - self.pos
                ),
            )));
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }
}

// =============================================================================
// STREAM
// =============================================================================

/// Writer over any [`io::Write`] sink.
///
/// Wrap the sink in an `io::BufWriter` for small writes to files or
/// sockets. Call [`StreamWriter::close`] to flush and take the sink back.
#[derive(Debug)]
pub struct StreamWriter<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Flush and release the sink.
    pub fn close(mut self) -> Result<W, CodecError> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Writer for StreamWriter<W> {
    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CodecError> {
        self.inner.flush()?;
        Ok(())
    }
}
