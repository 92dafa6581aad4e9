// Little-endian field reader with byte offset tracking

use crate::core::constants::{QSTRING_MAX_BYTES, QSTRING_NULL};
use crate::core::error::{RhdError, Result};
use std::io::{ErrorKind, Read};

/// Wraps a byte source and remembers how far into it we are, so that
/// every decode error can name the offending byte offset.
pub struct ByteReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_offset(inner, 0)
    }

    /// For streams that are already positioned past a prefix (e.g. the body after the header).
    pub fn with_offset(inner: R, offset: u64) -> Self {
        Self { inner, offset }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Fills `buf` completely; running out of input is a `Truncated` error.
    pub fn read_exact(&mut self, buf: &mut [u8], context: &str) -> Result<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                Err(RhdError::truncated(self.offset, context))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reads until `buf` is full or the input ends; returns the bytes read.
    pub fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.offset += filled as u64;
        Ok(filled)
    }

    fn read_array<const N: usize>(&mut self, context: &str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf, context)?;
        Ok(buf)
    }

    pub fn read_u16(&mut self, context: &str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array(context)?))
    }

    pub fn read_i16(&mut self, context: &str) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array(context)?))
    }

    pub fn read_u32(&mut self, context: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array(context)?))
    }

    pub fn read_f32(&mut self, context: &str) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a Qt `QString`: u32 byte length, then UTF-16LE code units.
    pub fn read_qstring(&mut self, context: &str) -> Result<String> {
        let start = self.offset;
        let len = self.read_u32(context)?;
        if len == QSTRING_NULL {
            return Ok(String::new());
        }
        if len % 2 != 0 || len > QSTRING_MAX_BYTES {
            return Err(RhdError::format(
                start,
                format!("malformed string length {} in {}", len, context),
            ));
        }

        let mut raw = vec![0u8; len as usize];
        self.read_exact(&mut raw, context)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        String::from_utf16(&units)
            .map_err(|_| RhdError::format(start, format!("invalid UTF-16 text in {}", context)))
    }
}
