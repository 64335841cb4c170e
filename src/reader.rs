//! Byte-order and pointer-width aware reader over a seekable stream.
//!
//! ELF and Mach-O describe their own byte order and word size in the first
//! few header bytes, so both are switchable while a parse is in progress.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{DetectorError, Result};
use crate::types::Endianness;

/// Width of pointer-sized fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    pub fn bytes(self) -> u64 {
        match self {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            PointerWidth::Bits32 => 32,
            PointerWidth::Bits64 => 64,
        }
    }
}

/// Reader for primitive integers with run-time byte order and pointer width.
pub struct EndianReader<R> {
    inner: R,
    endianness: Endianness,
    width: PointerWidth,
}

impl<R: Read + Seek> EndianReader<R> {
    /// Little-endian, 32-bit pointers until told otherwise.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            endianness: Endianness::Little,
            width: PointerWidth::Bits32,
        }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    pub fn pointer_width(&self) -> PointerWidth {
        self.width
    }

    pub fn set_pointer_width(&mut self, width: PointerWidth) {
        self.width = width;
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Advance past `count` bytes without reading them.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        let count = i64::try_from(count).map_err(|_| DetectorError::TruncatedData {
            offset: 0,
            expected: count,
        })?;
        self.inner.seek(SeekFrom::Current(count))?;
        Ok(())
    }

    /// Total stream length; the read position is preserved.
    pub fn stream_len(&mut self) -> Result<u64> {
        let pos = self.inner.stream_position()?;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(end)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let offset = self.position()?;
        self.inner.read_u8().map_err(|e| truncated(e, offset, 1))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let offset = self.position()?;
        match self.endianness {
            Endianness::Little => self.inner.read_u16::<LittleEndian>(),
            Endianness::Big => self.inner.read_u16::<BigEndian>(),
        }
        .map_err(|e| truncated(e, offset, 2))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let offset = self.position()?;
        match self.endianness {
            Endianness::Little => self.inner.read_u32::<LittleEndian>(),
            Endianness::Big => self.inner.read_u32::<BigEndian>(),
        }
        .map_err(|e| truncated(e, offset, 4))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let offset = self.position()?;
        match self.endianness {
            Endianness::Little => self.inner.read_u64::<LittleEndian>(),
            Endianness::Big => self.inner.read_u64::<BigEndian>(),
        }
        .map_err(|e| truncated(e, offset, 8))
    }

    /// Read a pointer-sized field, widened to `u64`.
    pub fn read_pointer(&mut self) -> Result<u64> {
        match self.width {
            PointerWidth::Bits32 => self.read_u32().map(u64::from),
            PointerWidth::Bits64 => self.read_u64(),
        }
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let offset = self.position()?;
        let mut buf = vec![0u8; count];
        self.inner
            .read_exact(&mut buf)
            .map_err(|e| truncated(e, offset, count as u64))?;
        Ok(buf)
    }

    /// Fill as much of `buf` as the stream allows; returns the count read.
    pub fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn truncated(err: io::Error, offset: u64, expected: u64) -> DetectorError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        DetectorError::TruncatedData { offset, expected }
    } else {
        DetectorError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_switch_endianness() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x01, 0x02, 0x03, 0x04];
        let mut reader = EndianReader::new(Cursor::new(&data[..]));
        assert_eq!(reader.read_u32().unwrap(), 0x04030201);
        reader.set_endianness(Endianness::Big);
        assert_eq!(reader.read_u32().unwrap(), 0x01020304);
    }

    #[test]
    fn test_pointer_width() {
        let data = [0xAA, 0, 0, 0, 0xBB, 0, 0, 0, 0, 0, 0, 0];
        let mut reader = EndianReader::new(Cursor::new(&data[..]));
        assert_eq!(reader.read_pointer().unwrap(), 0xAA);
        reader.set_pointer_width(PointerWidth::Bits64);
        assert_eq!(reader.read_pointer().unwrap(), 0xBB);
        assert_eq!(reader.position().unwrap(), 12);
    }

    #[test]
    fn test_short_read_is_truncation() {
        let data = [0x01, 0x02];
        let mut reader = EndianReader::new(Cursor::new(&data[..]));
        reader.skip(1).unwrap();
        match reader.read_u32() {
            Err(DetectorError::TruncatedData { offset, expected }) => {
                assert_eq!(offset, 1);
                assert_eq!(expected, 4);
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn test_len_preserves_position() {
        let data = [0u8; 10];
        let mut reader = EndianReader::new(Cursor::new(&data[..]));
        reader.seek_to(3).unwrap();
        assert_eq!(reader.stream_len().unwrap(), 10);
        assert_eq!(reader.position().unwrap(), 3);
    }

    #[test]
    fn test_read_up_to_stops_at_end() {
        let data = [1u8, 2, 3];
        let mut reader = EndianReader::new(Cursor::new(&data[..]));
        let mut buf = [0u8; 8];
        assert_eq!(reader.read_up_to(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &data);
    }
}
