//! # Primitive Binary Codec
//!
//! Fixed-width, big-endian encoding of the scalar and array values that
//! make up the repository wire format.
//!
//! Every `write_*` on [`Writer`] has an exact inverse `read_*` on [`Reader`],
//! plus a `skip_*` that advances past the value without materializing it.
//! Arrays and strings are length-prefixed with an Int32 count; strings are
//! UTF-8 byte arrays.
//!
//! ## Backings
//!
//! | Writer            | Reader            | Backing                         |
//! |-------------------|-------------------|---------------------------------|
//! | [`BufferWriter`]  | [`SliceReader`]   | growable buffer / borrowed bytes |
//! | [`SliceWriter`]   | [`SliceReader`]   | fixed byte window               |
//! | [`StreamWriter`]  | [`StreamReader`]  | any `io::Write` / `io::Read`    |
//! |                   | [`SeekReader`]    | `io::Read + io::Seek`           |
//!
//! All backings are functionally identical. They differ only in how they
//! skip: the seekable reader seeks, the stream reader reads and discards in
//! bounded chunks.
//!
//! ## Thread Safety
//!
//! Each reader or writer owns a single cursor. Individual calls are atomic
//! with respect to that cursor, but a sequence such as "read length, then
//! read N bytes" is only meaningful for one owner, so instances are `&mut`
//! throughout and must not be shared without external synchronization.

mod reader;
mod writer;

pub use reader::{SeekReader, SliceReader, StreamReader};
pub use writer::{BufferWriter, SliceWriter, StreamWriter};

use crate::primitives::MAX_ARRAY_LENGTH;
use thiserror::Error;

// =============================================================================
// ERRORS
// =============================================================================

/// Failures of the byte layer.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The source ran out before a value was complete.
    #[error(
        "Unexpected end of data at offset {offset}: requested {requested} bytes, {available} available"
    )]
    UnexpectedEnd {
        offset: u64,
        requested: u64,
        available: u64,
    },

    /// A length prefix was negative.
    #[error("Negative length {length} at offset {offset}")]
    NegativeLength { offset: u64, length: i32 },

    /// A length prefix exceeds the configured maximum.
    #[error("Length {length} exceeds maximum allowed {limit}")]
    LengthLimit { length: u64, limit: u64 },

    /// String bytes are not valid UTF-8.
    #[error("Invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: u64 },

    /// The underlying sink or source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// WRITER
// =============================================================================

/// Sink for the primitive wire values.
///
/// Implementors provide [`Writer::write_raw`]; every typed method is built on
/// top of it.
pub trait Writer {
    /// Append raw bytes with no prefix.
    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), CodecError>;

    /// Push buffered bytes to the underlying sink.
    fn flush(&mut self) -> Result<(), CodecError> {
        Ok(())
    }

    fn write_byte(&mut self, value: u8) -> Result<(), CodecError> {
        self.write_raw(&[value])
    }

    /// Write bytes verbatim (no length prefix).
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.write_raw(bytes)
    }

    fn write_boolean(&mut self, value: bool) -> Result<(), CodecError> {
        self.write_byte(u8::from(value))
    }

    fn write_short(&mut self, value: i16) -> Result<(), CodecError> {
        self.write_raw(&value.to_be_bytes())
    }

    fn write_int(&mut self, value: i32) -> Result<(), CodecError> {
        self.write_raw(&value.to_be_bytes())
    }

    fn write_long(&mut self, value: i64) -> Result<(), CodecError> {
        self.write_raw(&value.to_be_bytes())
    }

    fn write_float(&mut self, value: f32) -> Result<(), CodecError> {
        self.write_raw(&value.to_be_bytes())
    }

    fn write_double(&mut self, value: f64) -> Result<(), CodecError> {
        self.write_raw(&value.to_be_bytes())
    }

    /// Write an Int32 length prefix.
    fn write_length(&mut self, length: usize) -> Result<(), CodecError> {
        let length = i32::try_from(length).map_err(|_| CodecError::LengthLimit {
            length: length as u64,
            limit: i32::MAX as u64,
        })?;
        self.write_int(length)
    }

    /// Length-prefixed byte array.
    fn write_byte_array(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.write_length(bytes.len())?;
        self.write_raw(bytes)
    }

    /// Length-prefixed UTF-8 string.
    fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        self.write_byte_array(value.as_bytes())
    }

    fn write_boolean_array(&mut self, values: &[bool]) -> Result<(), CodecError> {
        self.write_length(values.len())?;
        values.iter().try_for_each(|v| self.write_boolean(*v))
    }

    fn write_short_array(&mut self, values: &[i16]) -> Result<(), CodecError> {
        self.write_length(values.len())?;
        values.iter().try_for_each(|v| self.write_short(*v))
    }

    fn write_int_array(&mut self, values: &[i32]) -> Result<(), CodecError> {
        self.write_length(values.len())?;
        values.iter().try_for_each(|v| self.write_int(*v))
    }

    fn write_long_array(&mut self, values: &[i64]) -> Result<(), CodecError> {
        self.write_length(values.len())?;
        values.iter().try_for_each(|v| self.write_long(*v))
    }

    fn write_float_array(&mut self, values: &[f32]) -> Result<(), CodecError> {
        self.write_length(values.len())?;
        values.iter().try_for_each(|v| self.write_float(*v))
    }

    fn write_double_array(&mut self, values: &[f64]) -> Result<(), CodecError> {
        self.write_length(values.len())?;
        values.iter().try_for_each(|v| self.write_double(*v))
    }

    fn write_string_array<S: AsRef<str>>(&mut self, values: &[S]) -> Result<(), CodecError>
    where
        Self: Sized,
    {
        self.write_length(values.len())?;
        values.iter().try_for_each(|v| self.write_string(v.as_ref()))
    }
}

// =============================================================================
// READER
// =============================================================================

/// Source of the primitive wire values.
///
/// Implementors provide [`Reader::read_raw`], [`Reader::skip_bytes`] and
/// [`Reader::position`]; every typed method is built on top of them.
pub trait Reader {
    /// Fill `buf` completely or fail with [`CodecError::UnexpectedEnd`].
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<(), CodecError>;

    /// Advance the cursor by `count` bytes without materializing them.
    fn skip_bytes(&mut self, count: u64) -> Result<(), CodecError>;

    /// Current cursor offset from the start of the source.
    fn position(&self) -> u64;

    /// Bytes known to remain, when the source can tell.
    fn remaining_hint(&self) -> Option<u64> {
        None
    }

    /// Largest length prefix this reader accepts.
    fn max_length(&self) -> u32 {
        MAX_ARRAY_LENGTH
    }

    fn read_byte(&mut self) -> Result<u8, CodecError> {
        let mut buf = [0u8; 1];
        self.read_raw(&mut buf)?;
        Ok(buf[0])
    }

    /// Read exactly `count` raw bytes (no length prefix).
    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, CodecError> {
        self.check_available(count as u64)?;
        let mut buf = vec![0u8; count];
        self.read_raw(&mut buf)?;
        Ok(buf)
    }

    fn read_boolean(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_byte()? != 0)
    }

    fn read_short(&mut self) -> Result<i16, CodecError> {
        let mut buf = [0u8; 2];
        self.read_raw(&mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    fn read_int(&mut self) -> Result<i32, CodecError> {
        let mut buf = [0u8; 4];
        self.read_raw(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn read_long(&mut self) -> Result<i64, CodecError> {
        let mut buf = [0u8; 8];
        self.read_raw(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    fn read_float(&mut self) -> Result<f32, CodecError> {
        let mut buf = [0u8; 4];
        self.read_raw(&mut buf)?;
        Ok(f32::from_be_bytes(buf))
    }

    fn read_double(&mut self) -> Result<f64, CodecError> {
        let mut buf = [0u8; 8];
        self.read_raw(&mut buf)?;
        Ok(f64::from_be_bytes(buf))
    }

    /// Read and validate an Int32 length prefix.
    fn read_length(&mut self) -> Result<usize, CodecError> {
        let offset = self.position();
        let length = self.read_int()?;
        if length < 0 {
            return Err(CodecError::NegativeLength { offset, length });
        }
        let limit = self.max_length();
        if length as u32 > limit {
            return Err(CodecError::LengthLimit {
                length: length as u64,
                limit: limit as u64,
            });
        }
        Ok(length as usize)
    }

    /// Fail early when the source is known to hold fewer than `count` bytes.
    fn check_available(&self, count: u64) -> Result<(), CodecError> {
        match self.remaining_hint() {
            Some(available) if available < count => Err(CodecError::UnexpectedEnd {
                offset: self.position(),
                requested: count,
                available,
            }),
            _ => Ok(()),
        }
    }

    /// Length-prefixed byte array.
    fn read_byte_array(&mut self) -> Result<Vec<u8>, CodecError> {
        let length = self.read_length()?;
        self.read_bytes(length)
    }

    /// Length-prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<String, CodecError> {
        let offset = self.position();
        let bytes = self.read_byte_array()?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8 { offset })
    }

    fn read_boolean_array(&mut self) -> Result<Vec<bool>, CodecError> {
        let length = self.read_length()?;
        self.check_available(length as u64)?;
        (0..length).map(|_| self.read_boolean()).collect()
    }

    fn read_short_array(&mut self) -> Result<Vec<i16>, CodecError> {
        let length = self.read_length()?;
        self.check_available(length as u64 * 2)?;
        (0..length).map(|_| self.read_short()).collect()
    }

    fn read_int_array(&mut self) -> Result<Vec<i32>, CodecError> {
        let length = self.read_length()?;
        self.check_available(length as u64 * 4)?;
        (0..length).map(|_| self.read_int()).collect()
    }

    fn read_long_array(&mut self) -> Result<Vec<i64>, CodecError> {
        let length = self.read_length()?;
        self.check_available(length as u64 * 8)?;
        (0..length).map(|_| self.read_long()).collect()
    }

    fn read_float_array(&mut self) -> Result<Vec<f32>, CodecError> {
        let length = self.read_length()?;
        self.check_available(length as u64 * 4)?;
        (0..length).map(|_| self.read_float()).collect()
    }

    fn read_double_array(&mut self) -> Result<Vec<f64>, CodecError> {
        let length = self.read_length()?;
        self.check_available(length as u64 * 8)?;
        (0..length).map(|_| self.read_double()).collect()
    }

    fn read_string_array(&mut self) -> Result<Vec<String>, CodecError> {
        let length = self.read_length()?;
        // Every string carries at least its own 4-byte prefix.
        self.check_available(length as u64 * 4)?;
        (0..length).map(|_| self.read_string()).collect()
    }

    fn skip_byte(&mut self) -> Result<(), CodecError> {
        self.skip_bytes(1)
    }

    fn skip_boolean(&mut self) -> Result<(), CodecError> {
        self.skip_bytes(1)
    }

    fn skip_short(&mut self) -> Result<(), CodecError> {
        self.skip_bytes(2)
    }

    fn skip_int(&mut self) -> Result<(), CodecError> {
        self.skip_bytes(4)
    }

    fn skip_long(&mut self) -> Result<(), CodecError> {
        self.skip_bytes(8)
    }

    fn skip_float(&mut self) -> Result<(), CodecError> {
        self.skip_bytes(4)
    }

    fn skip_double(&mut self) -> Result<(), CodecError> {
        self.skip_bytes(8)
    }

    fn skip_byte_array(&mut self) -> Result<(), CodecError> {
        let length = self.read_length()?;
        self.skip_bytes(length as u64)
    }

    fn skip_string(&mut self) -> Result<(), CodecError> {
        self.skip_byte_array()
    }

    fn skip_boolean_array(&mut self) -> Result<(), CodecError> {
        let length = self.read_length()?;
        self.skip_bytes(length as u64)
    }

    fn skip_short_array(&mut self) -> Result<(), CodecError> {
        let length = self.read_length()?;
        self.skip_bytes(length as u64 * 2)
    }

    fn skip_int_array(&mut self) -> Result<(), CodecError> {
        let length = self.read_length()?;
        self.skip_bytes(length as u64 * 4)
    }

    fn skip_long_array(&mut self) -> Result<(), CodecError> {
        let length = self.read_length()?;
        self.skip_bytes(length as u64 * 8)
    }

    fn skip_float_array(&mut self) -> Result<(), CodecError> {
        self.skip_int_array()
    }

    fn skip_double_array(&mut self) -> Result<(), CodecError> {
        self.skip_long_array()
    }

    fn skip_string_array(&mut self) -> Result<(), CodecError> {
        let length = self.read_length()?;
        (0..length).try_for_each(|_| self.skip_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
