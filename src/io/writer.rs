use byteorder::{ByteOrder, LittleEndian};

/// An append-only little-endian byte buffer. Unlike [`super::Reader`],
/// writes never fail: the buffer grows as needed. `patch_u32` supports the
/// common "write a placeholder offset now, fill it in once the referent is
/// known" pattern used throughout the root-signature and pipeline-cache
/// serialisers.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    data: Vec<u8>,
}

impl Writer {
    pub fn new() -> Writer {
        Writer { data: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Writer {
        Writer {
            data: Vec::with_capacity(cap),
        }
    }

    pub fn position(&self) -> usize {
        self.data.len()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, v);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_u32(&mut self, v: u32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, v);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_u64(&mut self, v: u64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, v);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_f32(&mut self, v: f32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_f32(&mut buf, v);
        self.data.extend_from_slice(&buf);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_tag(&mut self, tag: &[u8; 4]) {
        self.data.extend_from_slice(tag);
    }

    /// Reserve `n` zero bytes now, returning their offset so callers can
    /// `patch_u32` (or similar) once the value is known.
    pub fn reserve(&mut self, n: usize) -> usize {
        let at = self.data.len();
        self.data.resize(at + n, 0);
        at
    }

    pub fn patch_u32(&mut self, at: usize, v: u32) {
        LittleEndian::write_u32(&mut self.data[at..at + 4], v);
    }

    /// Overwrites previously-reserved bytes in place, e.g. with a POD struct
    /// serialised via `bytemuck::bytes_of`.
    pub fn patch_bytes(&mut self, at: usize, bytes: &[u8]) {
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
    }

    pub fn align_to(&mut self, align: usize) {
        let rem = self.data.len() % align;
        if rem != 0 {
            self.data.resize(self.data.len() + (align - rem), 0);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_rewrites_reserved_word() {
        let mut w = Writer::new();
        w.write_u32(0xAAAA_AAAA);
        let slot = w.reserve(4);
        w.write_u32(0xBBBB_BBBB);
        w.patch_u32(slot, 42);
        let bytes = w.into_bytes();
        assert_eq!(&bytes[4..8], &42u32.to_le_bytes());
    }

    #[test]
    fn align_pads_with_zero() {
        let mut w = Writer::new();
        w.write_bytes(&[1, 2, 3]);
        w.align_to(8);
        assert_eq!(w.position(), 8);
        assert_eq!(&w.as_bytes()[3..], &[0, 0, 0, 0, 0]);
    }
}
