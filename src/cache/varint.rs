//! Varint codec (spec.md §3 "Varint format"): 7-bit little-endian base-128
//! with high-bit continuation, the standard LEB128-unsigned-for-u32 shape.
//! Used to compress SPIR-V words before they go into the internal blob
//! store (C8's `spirv_cache`).
use crate::error::{Error, Result};
use crate::io::Reader;
use crate::io::Writer;

pub fn write_varint(out: &mut Writer, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.write_u8(byte);
            break;
        }
        out.write_u8(byte | 0x80);
    }
}

/// Decodes one varint starting at the reader's current position. Rejects
/// an encoding that would overflow 32 bits (more than 5 continuation
/// bytes) or that runs off the end of the buffer without a terminating
/// byte.
pub fn read_varint(r: &mut Reader) -> Result<u32> {
    let mut result: u32 = 0;
    let mut shift = 0u32;
    loop {
        if shift >= 35 {
            return Err(Error::invalid_argument("varint too long"));
        }
        let byte = r.read_u8()?;
        result |= u32::from(byte & 0x7f) << shift.min(31);
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Ok(result)
}

pub fn encode_words(words: &[u32]) -> Vec<u8> {
    let mut out = Writer::with_capacity(words.len() * 2);
    for &w in words {
        write_varint(&mut out, w);
    }
    out.into_bytes()
}

pub fn decode_words(data: &[u8]) -> Result<Vec<u32>> {
    let mut r = Reader::new(data);
    let mut out = Vec::new();
    while !r.is_empty() {
        out.push(read_varint(&mut r)?);
    }
    Ok(out)
}
