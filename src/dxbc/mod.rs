//! DXBC container codec (C3): validate the outer header, walk the chunk
//! directory, dispatch each chunk to a caller-supplied handler; and the
//! mirror-image serialiser used by the root-signature codec (C5).
mod chunk;

pub use chunk::*;

use crate::checksum::write_dxbc_checksum;
use crate::error::{Error, Result};
use crate::io::Reader;

pub const DXBC_MAGIC: u32 = 0x4344_5844; // little-endian bytes "DXBC" read as a u32
const DXBC_VERSION: u32 = 0x0000_0001;
/// `magic(4) + checksum(16) + version(4) + total_size(4) + chunk_count(4)`.
pub const DXBC_HEADER_SIZE: usize = 4 + 16 + 4 + 4 + 4;

/// Walk `data` as a DXBC container, invoking `handler` once per chunk in
/// directory order. A handler returning `Err` aborts iteration and that
/// error is propagated to the caller.
///
/// The outer checksum at bytes 4..20 is read but never validated against a
/// recomputed value (the reference implementation treats it the same way:
/// legitimate precompiled shaders are accepted even if their checksum is
/// stale).
pub fn parse_dxbc<'a, F>(data: &'a [u8], mut handler: F) -> Result<()>
where
    F: FnMut(Chunk<'a>) -> Result<()>,
{
    let mut r = Reader::new(data);
    let magic = r.read_tag()?;
    if magic != TAG_DXBC {
        return Err(Error::invalid_argument("not a DXBC container"));
    }
    r.skip(16)?; // checksum, ignored on parse
    let version = r.read_u32()?;
    if version != DXBC_VERSION {
        return Err(Error::invalid_argument("unsupported DXBC version"));
    }
    let _total_size = r.read_u32()?;
    let chunk_count = r.read_u32()? as usize;

    let offsets = r.read_u32_vec(chunk_count)?;

    for offset in offsets {
        let offset = offset as usize;
        if offset > data.len() {
            return Err(Error::invalid_argument("chunk offset out of bounds"));
        }
        let mut cr = Reader::at(data, offset);
        let tag = cr.read_tag()?;
        let size = cr.read_u32()? as usize;
        let payload = cr.read_bytes(size)?;
        handler(Chunk { tag, data: payload })?;
    }
    Ok(())
}

/// Returns whether `data` contains a `DXIL` chunk, meaning the shader body
/// must be delegated to the external DXIL translator (see spec.md §6).
pub fn shader_is_dxil(data: &[u8]) -> bool {
    let mut found = false;
    let _ = parse_dxbc(data, |chunk| {
        if chunk.tag == TAG_DXIL {
            found = true;
        }
        Ok(())
    });
    found
}

/// Builds a DXBC container with exactly the chunks yielded by `chunks`,
/// recomputing the checksum at the end (C2). Used by the root-signature
/// serialiser (C5) to wrap an `RTS0` payload, but kept generic over any
/// `(tag, payload)` sequence.
pub fn serialize_dxbc<'a, I>(chunks: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a [u8; 4], &'a [u8])>,
{
    let chunks: Vec<_> = chunks.into_iter().collect();
    let mut out = Vec::new();
    out.extend_from_slice(&TAG_DXBC);
    out.extend_from_slice(&[0u8; 16]); // checksum placeholder
    out.extend_from_slice(&DXBC_VERSION.to_le_bytes());
    let total_size_at = out.len();
    out.extend_from_slice(&[0u8; 4]); // total size placeholder
    out.extend_from_slice(&(chunks.len() as u32).to_le_bytes());

    let directory_at = out.len();
    out.resize(directory_at + chunks.len() * 4, 0);

    for (i, (tag, payload)) in chunks.iter().enumerate() {
        let offset = out.len() as u32;
        out[directory_at + i * 4..directory_at + i * 4 + 4].copy_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(*tag);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
    }

    let total_size = out.len() as u32;
    out[total_size_at..total_size_at + 4].copy_from_slice(&total_size.to_le_bytes());

    write_dxbc_checksum(&mut out).expect("serialised container always exceeds the hashable offset");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_header(chunk_count: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&TAG_DXBC);
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&DXBC_VERSION.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes()); // total size, informational
        data.extend_from_slice(&chunk_count.to_le_bytes());
        data
    }

    #[test]
    fn header_only_buffer_parses_with_zero_chunks() {
        let data = minimal_header(0);
        assert_eq!(data.len(), DXBC_HEADER_SIZE);
        let mut seen = 0;
        parse_dxbc(&data, |_| {
            seen += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, 0);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut data = minimal_header(0);
        data[0] = b'X';
        assert!(parse_dxbc(&data, |_| Ok(())).is_err());
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut data = minimal_header(0);
        data[20..24].copy_from_slice(&2u32.to_le_bytes());
        assert!(parse_dxbc(&data, |_| Ok(())).is_err());
    }

    #[test]
    fn zero_size_chunk_parses_successfully() {
        let mut data = minimal_header(1);
        let chunk_offset = data.len() as u32 + 4; // one offset word follows
        data.extend_from_slice(&chunk_offset.to_le_bytes());
        data.extend_from_slice(b"ISGN");
        data.extend_from_slice(&0u32.to_le_bytes());

        let mut tags = Vec::new();
        parse_dxbc(&data, |chunk| {
            tags.push(chunk.tag);
            assert!(chunk.data.is_empty());
            Ok(())
        })
        .unwrap();
        assert_eq!(tags, vec![*b"ISGN"]);
    }

    #[test]
    fn handler_error_aborts_and_propagates() {
        let mut data = minimal_header(2);
        let first_offset = data.len() as u32 + 8;
        data.extend_from_slice(&first_offset.to_le_bytes());
        data.extend_from_slice(&first_offset.to_le_bytes());
        data.extend_from_slice(b"ISGN");
        data.extend_from_slice(&0u32.to_le_bytes());

        let mut calls = 0;
        let result = parse_dxbc(&data, |_| {
            calls += 1;
            Err(Error::invalid_argument("stop"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn detects_dxil_chunk() {
        let dxbc = serialize_dxbc(vec![(&TAG_DXIL, &b"whatever"[..])]);
        assert!(shader_is_dxil(&dxbc));
        let dxbc_no_dxil = serialize_dxbc(vec![(&TAG_ISGN, &b""[..])]);
        assert!(!shader_is_dxil(&dxbc_no_dxil));
    }

    #[test]
    fn serialize_then_parse_round_trips_chunks() {
        let payload_a: &[u8] = b"hello";
        let payload_b: &[u8] = b"world!!";
        let dxbc = serialize_dxbc(vec![(&TAG_ISGN, payload_a), (&TAG_OSGN, payload_b)]);

        let mut seen = Vec::new();
        parse_dxbc(&dxbc, |chunk| {
            seen.push((chunk.tag, chunk.data.to_vec()));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen[0], (TAG_ISGN, payload_a.to_vec()));
        assert_eq!(seen[1], (TAG_OSGN, payload_b.to_vec()));
    }
}
