use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::io::require_space;

/// A bounds-checked cursor over a borrowed byte slice. Every read validates
/// that `offset + count * element_size <= data.len()` before touching the
/// buffer; out-of-bounds reads return [`Error::InvalidArgument`] rather than
/// panicking.
#[derive(Clone, Copy)]
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Reader<'a> {
        Reader { data, offset: 0 }
    }

    pub fn at(data: &'a [u8], offset: usize) -> Reader<'a> {
        Reader { data, offset }
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn ensure(&self, count: usize, size: usize) -> Result<()> {
        if require_space(self.offset, count, size, self.data.len()) {
            Ok(())
        } else {
            Err(Error::invalid_argument("read past end of buffer"))
        }
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(1, n)?;
        self.offset += n;
        Ok(())
    }

    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(Error::invalid_argument("seek past end of buffer"));
        }
        self.offset = offset;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1, 1)?;
        let v = self.data[self.offset];
        self.offset += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(1, 2)?;
        let v = LittleEndian::read_u16(&self.data[self.offset..]);
        self.offset += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(1, 4)?;
        let v = LittleEndian::read_u32(&self.data[self.offset..]);
        self.offset += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(1, 8)?;
        let v = LittleEndian::read_u64(&self.data[self.offset..]);
        self.offset += 8;
        Ok(v)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.ensure(1, 4)?;
        let v = LittleEndian::read_f32(&self.data[self.offset..]);
        self.offset += 4;
        Ok(v)
    }

    /// Read `count` consecutive `u32`s as a borrowed slice reinterpretation
    /// would require alignment we can't guarantee, so this copies into a
    /// `Vec`.
    pub fn read_u32_vec(&mut self, count: usize) -> Result<Vec<u32>> {
        self.ensure(count, 4)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_u32()?);
        }
        Ok(out)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        self.ensure(count, 1)?;
        let slice = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    pub fn read_tag(&mut self) -> Result<[u8; 4]> {
        let bytes = self.read_bytes(4)?;
        let mut tag = [0u8; 4];
        tag.copy_from_slice(bytes);
        Ok(tag)
    }

    /// Returns the NUL-terminated ASCII string starting at `offset` in the
    /// whole buffer (not relative to the cursor). Fails if no NUL byte is
    /// found before the buffer ends.
    pub fn get_cstring(&self, offset: usize) -> Result<&'a str> {
        if offset > self.data.len() {
            return Err(Error::invalid_argument("string offset out of bounds"));
        }
        let tail = &self.data[offset..];
        let nul = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::invalid_argument("unterminated string"))?;
        std::str::from_utf8(&tail[..nul])
            .map_err(|_| Error::invalid_argument("string is not valid utf-8"))
    }

    pub fn full_data(&self) -> &'a [u8] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_scalars_in_order() {
        let data = [0x01, 0x00, 0x00, 0x00, 0x02, 0x00];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_u32().unwrap(), 1);
        assert_eq!(r.read_u16().unwrap(), 2);
        assert!(r.is_empty());
    }

    #[test]
    fn read_past_end_fails() {
        let data = [0u8; 3];
        let mut r = Reader::new(&data);
        assert!(r.read_u32().is_err());
    }

    #[test]
    fn cstring_requires_nul() {
        let data = b"hello\0world";
        let r = Reader::new(data);
        assert_eq!(r.get_cstring(0).unwrap(), "hello");
        assert_eq!(r.get_cstring(6).unwrap(), "world");
        let data2 = b"no-nul-here";
        let r2 = Reader::new(data2);
        assert!(r2.get_cstring(0).is_err());
    }
}
