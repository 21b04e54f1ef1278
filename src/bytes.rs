use std::io::{ErrorKind, Read, Seek, SeekFrom};

use crate::{Error, Result};

/// First two bytes of every Nortek log: the sync byte and the hardware
/// configuration type code. Byte-order independent.
pub const MAGIC_HEADER: [u8; 2] = [0xa5, 0x05];

/// Size word following the magic header: the hardware configuration record
/// is 24 words long. Its byte order reveals the file's.
pub const MAGIC_SIZE_WORD: u16 = 0x0018;

/// Byte order of all multi-byte integers in a log, fixed per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn u16(self, b: [u8; 2]) -> u16 {
        match self {
            Endian::Little => u16::from_le_bytes(b),
            Endian::Big => u16::from_be_bytes(b),
        }
    }

    pub fn i16(self, b: [u8; 2]) -> i16 {
        self.u16(b) as i16
    }

    pub fn u32(self, b: [u8; 4]) -> u32 {
        match self {
            Endian::Little => u32::from_le_bytes(b),
            Endian::Big => u32::from_be_bytes(b),
        }
    }

    pub fn f32(self, b: [u8; 4]) -> f32 {
        f32::from_bits(self.u32(b))
    }

    /// 16-bit word at byte offset `off` of `dat`.
    pub fn u16_at(self, dat: &[u8], off: usize) -> u16 {
        self.u16([dat[off], dat[off + 1]])
    }

    pub fn i16_at(self, dat: &[u8], off: usize) -> i16 {
        self.u16_at(dat, off) as i16
    }

    pub fn u32_at(self, dat: &[u8], off: usize) -> u32 {
        self.u32([dat[off], dat[off + 1], dat[off + 2], dat[off + 3]])
    }

    pub fn f32_at(self, dat: &[u8], off: usize) -> f32 {
        f32::from_bits(self.u32_at(dat, off))
    }
}

/// Seekable, endian-aware byte source for a single log file.
///
/// The offset only moves backwards during explicit resynchronization or
/// capacity-estimation seeks; everything else reads strictly forward.
pub struct ByteCursor<R>
where
    R: Read + Seek,
{
    reader: R,
    pos: u64,
    len: u64,
    endian: Endian,
}

impl<R> ByteCursor<R>
where
    R: Read + Seek,
{
    /// Creates a cursor positioned at offset 0. The byte order defaults to
    /// little-endian until [`detect_endian`](Self::detect_endian) runs.
    pub fn new(mut reader: R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(ByteCursor {
            reader,
            pos: 0,
            len,
            endian: Endian::Little,
        })
    }

    /// Probes the 4-byte magic prefix and fixes the cursor's byte order,
    /// rewinding to offset 0. The header bytes are order-independent; the
    /// size word that follows them is read under both orders to tell the
    /// two apart.
    ///
    /// # Errors
    /// [`Error::UnrecognizedFormat`] if the prefix matches neither order.
    pub fn detect_endian(&mut self) -> Result<Endian> {
        let dat = self.read_fixed(4).map_err(|_| {
            Error::UnrecognizedFormat("file shorter than the magic prefix".to_string())
        })?;
        if dat[0..2] != MAGIC_HEADER {
            return Err(Error::UnrecognizedFormat(
                "no hardware configuration header at offset 0".to_string(),
            ));
        }
        let endian = if Endian::Little.u16_at(&dat, 2) == MAGIC_SIZE_WORD {
            Endian::Little
        } else if Endian::Big.u16_at(&dat, 2) == MAGIC_SIZE_WORD {
            Endian::Big
        } else {
            return Err(Error::UnrecognizedFormat(
                "magic prefix matched neither byte order".to_string(),
            ));
        };
        self.endian = endian;
        self.seek_to(0)?;
        Ok(endian)
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Reads exactly `n` bytes, advancing the offset.
    ///
    /// # Errors
    /// [`Error::TruncatedStream`] if fewer than `n` bytes remain.
    pub fn read_fixed(&mut self, n: usize) -> Result<Vec<u8>> {
        if self.remaining() < n as u64 {
            // Park the cursor at the end so callers observe a consistent
            // offset after a short read.
            self.seek_to(self.len)?;
            return Err(Error::TruncatedStream);
        }
        let mut buf = vec![0u8; n];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {
                self.pos += n as u64;
                Ok(buf)
            }
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Err(Error::TruncatedStream),
            Err(err) => Err(Error::Io(err)),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_fixed(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let dat = self.read_fixed(2)?;
        Ok(self.endian.u16([dat[0], dat[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let dat = self.read_fixed(4)?;
        Ok(self.endian.u32([dat[0], dat[1], dat[2], dat[3]]))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads the next 16-bit word without advancing the offset.
    pub fn peek_u16(&mut self) -> Result<u16> {
        let word = self.read_u16()?;
        self.seek_relative(-2)?;
        Ok(word)
    }

    pub fn seek_relative(&mut self, delta: i64) -> Result<()> {
        let target = self
            .pos
            .checked_add_signed(delta)
            .ok_or(Error::TruncatedStream)?;
        self.seek_to(target)
    }

    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        if offset > self.len {
            return Err(Error::TruncatedStream);
        }
        self.reader.seek(SeekFrom::Start(offset))?;
        self.pos = offset;
        Ok(())
    }

    /// Current byte offset.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Total length of the underlying source.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> u64 {
        self.len - self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn primitive_reads_advance_offset() {
        let dat: Vec<u8> = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let mut cur = ByteCursor::new(Cursor::new(dat)).unwrap();

        assert_eq!(cur.read_u8().unwrap(), 0x01);
        assert_eq!(cur.position(), 1);
        assert_eq!(cur.read_u16().unwrap(), 0x0302);
        assert_eq!(cur.position(), 3);
        assert_eq!(cur.remaining(), 3);
    }

    #[test]
    fn peek_does_not_advance() {
        let dat: Vec<u8> = vec![0xa5, 0x11, 0x00];
        let mut cur = ByteCursor::new(Cursor::new(dat)).unwrap();
        assert_eq!(cur.peek_u16().unwrap(), 0x11a5);
        assert_eq!(cur.position(), 0);
        assert_eq!(cur.read_u16().unwrap(), 0x11a5);
    }

    #[test]
    fn short_read_is_truncation() {
        let dat: Vec<u8> = vec![1, 2, 3];
        let mut cur = ByteCursor::new(Cursor::new(dat)).unwrap();
        assert!(matches!(cur.read_fixed(4), Err(Error::TruncatedStream)));
    }

    #[test]
    fn detects_little_endian_magic() {
        let dat: Vec<u8> = vec![0xa5, 0x05, 0x18, 0x00, 0xff];
        let mut cur = ByteCursor::new(Cursor::new(dat)).unwrap();
        assert_eq!(cur.detect_endian().unwrap(), Endian::Little);
        assert_eq!(cur.position(), 0, "cursor must rewind after the probe");
    }

    #[test]
    fn detects_big_endian_magic() {
        let dat: Vec<u8> = vec![0xa5, 0x05, 0x00, 0x18];
        let mut cur = ByteCursor::new(Cursor::new(dat)).unwrap();
        assert_eq!(cur.detect_endian().unwrap(), Endian::Big);
    }

    #[test]
    fn rejects_bad_magic() {
        let dat: Vec<u8> = vec![0xde, 0xad, 0xbe, 0xef];
        let mut cur = ByteCursor::new(Cursor::new(dat)).unwrap();
        assert!(matches!(
            cur.detect_endian(),
            Err(Error::UnrecognizedFormat(_))
        ));
    }
}
