//! Chunk tag constants recognised by this crate.

pub const TAG_DXBC: [u8; 4] = *b"DXBC";

pub const TAG_ISGN: [u8; 4] = *b"ISGN";
pub const TAG_ISG1: [u8; 4] = *b"ISG1";
pub const TAG_OSGN: [u8; 4] = *b"OSGN";
pub const TAG_OSG5: [u8; 4] = *b"OSG5";
pub const TAG_OSG1: [u8; 4] = *b"OSG1";
pub const TAG_PCSG: [u8; 4] = *b"PCSG";
pub const TAG_PSG1: [u8; 4] = *b"PSG1";

pub const TAG_SHDR: [u8; 4] = *b"SHDR";
pub const TAG_SHEX: [u8; 4] = *b"SHEX";
pub const TAG_AON9: [u8; 4] = *b"AON9";
pub const TAG_RTS0: [u8; 4] = *b"RTS0";
pub const TAG_DXIL: [u8; 4] = *b"DXIL";

/// A single `(tag, payload)` entry from a container's chunk directory.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub tag: [u8; 4],
    pub data: &'a [u8],
}

impl<'a> Chunk<'a> {
    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }
}
