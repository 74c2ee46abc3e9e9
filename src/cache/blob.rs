//! Pipeline blob layout (spec.md §3 "Pipeline blob" and §4.8 "Blob
//! layout"): the application-visible `Header + Chunks` sequence handed back
//! from `StorePipeline`/`LoadPipeline`, and the internal wrapper used by the
//! de-duplicated SPIR-V/driver-cache stores.
use crate::error::{Error, Result};
use crate::fnv::fnv1_64;
use crate::io::{Reader, Writer};

pub const PIPELINE_BLOB_MAGIC: u32 = 0x3442_4b56; // "VKB4" little-endian
pub const MAX_STAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Opaque driver pipeline-cache bytes, inlined.
    DriverCacheBlob,
    /// Varint-compressed SPIR-V words, inlined.
    SpirvInline,
    /// 64-bit hash of a `driver_cache` entry stored elsewhere.
    DriverCacheLink,
    /// 64-bit hash of a `spirv_cache` entry stored elsewhere.
    SpirvLink,
    /// Per-stage shader metadata (entry point, bindings summary, etc).
    ShaderMetadata,
    /// The PSO-compatibility record (see [`CompatRecord`]).
    CompatRecord,
    /// Per-stage shader identifier (content hash used for matching).
    ShaderIdentifier,
}

impl ChunkKind {
    fn to_u16(self) -> u16 {
        match self {
            ChunkKind::DriverCacheBlob => 0,
            ChunkKind::SpirvInline => 1,
            ChunkKind::DriverCacheLink => 2,
            ChunkKind::SpirvLink => 3,
            ChunkKind::ShaderMetadata => 4,
            ChunkKind::CompatRecord => 5,
            ChunkKind::ShaderIdentifier => 6,
        }
    }

    fn from_u16(v: u16) -> Result<ChunkKind> {
        Ok(match v {
            0 => ChunkKind::DriverCacheBlob,
            1 => ChunkKind::SpirvInline,
            2 => ChunkKind::DriverCacheLink,
            3 => ChunkKind::SpirvLink,
            4 => ChunkKind::ShaderMetadata,
            5 => ChunkKind::CompatRecord,
            6 => ChunkKind::ShaderIdentifier,
            _ => return Err(Error::invalid_argument("unknown pipeline blob chunk kind")),
        })
    }
}

/// Chunk type word: kind in the lower 16 bits, an optional shader-stage
/// index in the upper 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTag {
    pub kind: ChunkKind,
    pub stage: u16,
}

impl ChunkTag {
    pub fn new(kind: ChunkKind, stage: u16) -> ChunkTag {
        ChunkTag { kind, stage }
    }

    fn to_u32(self) -> u32 {
        (u32::from(self.stage) << 16) | u32::from(self.kind.to_u16())
    }

    fn from_u32(v: u32) -> Result<ChunkTag> {
        let kind = ChunkKind::from_u16((v & 0xffff) as u16)?;
        let stage = (v >> 16) as u16;
        Ok(ChunkTag { kind, stage })
    }
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub tag: ChunkTag,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineBlobHeader {
    pub vendor_id: u32,
    pub device_id: u32,
    pub build_tag: u64,
    pub shader_interface_key: u64,
    pub uuid: [u8; 16],
}

/// `state_desc_compat_hash`, `root_signature_compat_hash` and
/// `dxbc_blob_hashes` together form the compatibility record checked on
/// load (spec.md §4.8 "Keying and compatibility").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompatRecord {
    pub state_desc_compat_hash: u64,
    pub root_signature_compat_hash: u64,
    pub dxbc_blob_hashes: [u64; MAX_STAGES],
}

impl CompatRecord {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(8 + 8 + MAX_STAGES * 8);
        w.write_u64(self.state_desc_compat_hash);
        w.write_u64(self.root_signature_compat_hash);
        for h in &self.dxbc_blob_hashes {
            w.write_u64(*h);
        }
        w.into_bytes()
    }

    /// Fails with *driver-version-mismatch* on a missing or short chunk,
    /// matching spec.md §4.8's distinction between a malformed compat
    /// record (version problem) and a mismatched one (content problem).
    pub fn from_bytes(data: &[u8]) -> Result<CompatRecord> {
        let expected = 16 + MAX_STAGES * 8;
        if data.len() < expected {
            return Err(Error::driver_mismatch("truncated PSO-compatibility record"));
        }
        let mut r = Reader::new(data);
        let state_desc_compat_hash = r.read_u64()?;
        let root_signature_compat_hash = r.read_u64()?;
        let mut dxbc_blob_hashes = [0u64; MAX_STAGES];
        for h in dxbc_blob_hashes.iter_mut() {
            *h = r.read_u64()?;
        }
        Ok(CompatRecord {
            state_desc_compat_hash,
            root_signature_compat_hash,
            dxbc_blob_hashes,
        })
    }

    /// Mixes a per-stage DXBC content hash with its stage index so that
    /// the same bytes bound to different stages don't collide.
    pub fn stage_hash(stage: usize, dxbc: &[u8]) -> u64 {
        crate::fnv::fnv1_64_continue(fnv1_64(&(stage as u32).to_le_bytes()), dxbc)
    }
}

fn chunk_padding(len: usize) -> usize {
    (8 - (len % 8)) % 8
}

/// Serialises the application-visible pipeline blob: header, then every
/// chunk padded to an 8-byte boundary, then the checksum patched over the
/// whole thing.
pub fn serialize_pipeline_blob(header: &PipelineBlobHeader, chunks: &[Chunk]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(PIPELINE_BLOB_MAGIC);
    w.write_u32(header.vendor_id);
    w.write_u32(header.device_id);
    let checksum_at = w.reserve(8);
    w.write_u64(header.build_tag);
    w.write_u64(header.shader_interface_key);
    w.write_bytes(&header.uuid);

    for chunk in chunks {
        w.write_u32(chunk.tag.to_u32());
        w.write_u32(chunk.data.len() as u32);
        w.write_bytes(&chunk.data);
        w.align_to(8);
    }

    let mut bytes = w.into_bytes();
    let checksum = fnv1_64(&bytes[checksum_at + 8..]);
    bytes[checksum_at..checksum_at + 8].copy_from_slice(&checksum.to_le_bytes());
    bytes
}

pub fn parse_pipeline_blob(data: &[u8]) -> Result<(PipelineBlobHeader, Vec<Chunk>)> {
    let mut r = Reader::new(data);
    let magic = r.read_u32()?;
    if magic != PIPELINE_BLOB_MAGIC {
        return Err(Error::driver_mismatch("pipeline blob magic mismatch"));
    }
    let vendor_id = r.read_u32()?;
    let device_id = r.read_u32()?;
    let checksum = r.read_u64()?;
    let build_tag = r.read_u64()?;
    let shader_interface_key = r.read_u64()?;
    let uuid_bytes = r.read_bytes(16)?;
    let mut uuid = [0u8; 16];
    uuid.copy_from_slice(uuid_bytes);

    let body_start = r.position();
    let expected = fnv1_64(&data[body_start..]);
    if expected != checksum {
        return Err(Error::driver_mismatch("pipeline blob checksum mismatch"));
    }

    let mut chunks = Vec::new();
    while !r.is_empty() {
        let tag = ChunkTag::from_u32(r.read_u32()?)?;
        let size = r.read_u32()? as usize;
        let payload = r.read_bytes(size)?.to_vec();
        let pad = chunk_padding(size);
        if pad > 0 {
            r.skip(pad)?;
        }
        chunks.push(Chunk { tag, data: payload });
    }

    Ok((
        PipelineBlobHeader {
            vendor_id,
            device_id,
            build_tag,
            shader_interface_key,
            uuid,
        },
        chunks,
    ))
}

/// The internal de-duplicated store's wrapper around SPIR-V/driver-cache
/// bytes (spec.md §4.8 "Internal de-duplication"): `(checksum, data)`,
/// hashed with FNV-1 for the store key.
pub fn wrap_internal_blob(data: &[u8]) -> (u64, Vec<u8>) {
    let mut w = Writer::with_capacity(8 + data.len());
    w.write_u64(fnv1_64(data));
    w.write_bytes(data);
    let wrapped = w.into_bytes();
    let hash = fnv1_64(&wrapped);
    (hash, wrapped)
}

pub fn unwrap_internal_blob(wrapped: &[u8]) -> Result<&[u8]> {
    if wrapped.len() < 8 {
        return Err(Error::invalid_argument("truncated internal blob"));
    }
    let mut r = Reader::new(wrapped);
    let checksum = r.read_u64()?;
    let data = &r.full_data()[8..];
    if fnv1_64(data) != checksum {
        return Err(Error::driver_mismatch("internal blob checksum mismatch"));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> PipelineBlobHeader {
        PipelineBlobHeader {
            vendor_id: 0x1002,
            device_id: 0x73df,
            build_tag: 42,
            shader_interface_key: 7,
            uuid: [9u8; 16],
        }
    }

    #[test]
    fn round_trips_header_and_chunks() {
        let chunks = vec![
            Chunk {
                tag: ChunkTag::new(ChunkKind::SpirvLink, 0),
                data: 0xdead_beef_u64.to_le_bytes().to_vec(),
            },
            Chunk {
                tag: ChunkTag::new(ChunkKind::CompatRecord, 0),
                data: vec![1, 2, 3],
            },
        ];
        let blob = serialize_pipeline_blob(&header(), &chunks);
        let (parsed_header, parsed_chunks) = parse_pipeline_blob(&blob).unwrap();
        assert_eq!(parsed_header, header());
        assert_eq!(parsed_chunks.len(), 2);
        assert_eq!(parsed_chunks[0].tag, ChunkTag::new(ChunkKind::SpirvLink, 0));
        assert_eq!(parsed_chunks[1].data, vec![1, 2, 3]);
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let blob = serialize_pipeline_blob(&header(), &[]);
        let mut corrupt = blob;
        // flip a byte in the header tail, which the checksum covers
        corrupt[16] ^= 0xff;
        assert!(parse_pipeline_blob(&corrupt).is_err());
    }

    #[test]
    fn compat_record_round_trips() {
        let rec = CompatRecord {
            state_desc_compat_hash: 11,
            root_signature_compat_hash: 22,
            dxbc_blob_hashes: [1, 2, 3, 4, 5],
        };
        let bytes = rec.to_bytes();
        assert_eq!(CompatRecord::from_bytes(&bytes).unwrap(), rec);
    }

    #[test]
    fn truncated_compat_record_is_driver_mismatch() {
        let err = CompatRecord::from_bytes(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, Error::DriverVersionMismatch(_)));
    }

    #[test]
    fn internal_blob_wrap_round_trips() {
        let data = b"some spirv bytes, varint-encoded";
        let (hash, wrapped) = wrap_internal_blob(data);
        assert_ne!(hash, 0);
        assert_eq!(unwrap_internal_blob(&wrapped).unwrap(), data);
    }
}
