//! Monolithic table-of-contents persistence format (spec.md §4.8
//! "Persistence", `VKL4`): everything the application serialises with a
//! single `Serialize` call lands in one file, TOC arrays first, bodies
//! last.
use crate::cache::key::LibraryKey;
use crate::error::{Error, Result};
use crate::io::{Reader, Writer};

pub const TOC_MAGIC: u32 = 0x344c_4b56; // "VKL4" little-endian
const TOC_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocHeader {
    pub vendor_id: u32,
    pub device_id: u32,
    pub build_tag: u64,
    pub shader_interface_key: u64,
    pub uuid: [u8; 16],
}

pub struct TocEntry {
    pub key: LibraryKey,
    pub data: Vec<u8>,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct RawTocEntry {
    blob_offset: u64,
    name_length: u32,
    blob_length: u32,
}

fn name_bytes(key: &LibraryKey) -> Option<Vec<u8>> {
    match key {
        LibraryKey::Name(utf16) => {
            let mut bytes = Vec::with_capacity(utf16.len() * 2);
            for unit in utf16 {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            Some(bytes)
        }
        LibraryKey::InternalHash(_) => None,
    }
}

/// Serialises one section (spirv / driver-cache / pipeline entries) worth
/// of `(key, blob)` pairs as `TOC[count] + name_table_slice + blob_bodies`,
/// matching the section layout described in spec.md §4.8.
pub fn serialize_toc(
    header: &TocHeader,
    spirv: &[TocEntry],
    driver_cache: &[TocEntry],
    pipelines: &[TocEntry],
) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(TOC_MAGIC);
    w.write_u32(TOC_VERSION);
    w.write_u32(header.vendor_id);
    w.write_u32(header.device_id);
    w.write_u32(spirv.len() as u32);
    w.write_u32(driver_cache.len() as u32);
    w.write_u32(pipelines.len() as u32);
    w.write_u64(header.build_tag);
    w.write_u64(header.shader_interface_key);
    w.write_bytes(&header.uuid);

    let all: Vec<&TocEntry> = spirv
        .iter()
        .chain(driver_cache.iter())
        .chain(pipelines.iter())
        .collect();

    let toc_at = w.position();
    for _ in &all {
        w.reserve(8); // blob_offset
        w.reserve(4); // name_length
        w.reserve(4); // blob_length
    }

    let mut name_lengths = Vec::with_capacity(all.len());
    for entry in &all {
        match name_bytes(&entry.key) {
            Some(bytes) => {
                name_lengths.push((bytes.len() / 2) as u32);
                w.write_bytes(&bytes);
            }
            None => {
                name_lengths.push(0);
                let hash = match entry.key {
                    LibraryKey::InternalHash(h) => h,
                    LibraryKey::Name(_) => unreachable!(),
                };
                w.write_u64(hash);
            }
        }
    }

    let mut blob_offsets = Vec::with_capacity(all.len());
    for entry in &all {
        w.align_to(8);
        blob_offsets.push(w.position() as u64);
        w.write_bytes(&entry.data);
    }

    for (i, entry) in all.iter().enumerate() {
        let raw = RawTocEntry {
            blob_offset: blob_offsets[i],
            name_length: name_lengths[i],
            blob_length: entry.data.len() as u32,
        };
        w.patch_bytes(toc_at + i * std::mem::size_of::<RawTocEntry>(), bytemuck::bytes_of(&raw));
    }

    w.into_bytes()
}

fn read_raw_entry(r: &mut Reader) -> Result<RawTocEntry> {
    let bytes = r.read_bytes(std::mem::size_of::<RawTocEntry>())?;
    Ok(bytemuck::pod_read_unaligned(bytes))
}

pub fn parse_toc(data: &[u8]) -> Result<(TocHeader, Vec<TocEntry>, Vec<TocEntry>, Vec<TocEntry>)> {
    let mut r = Reader::new(data);
    let magic = r.read_u32()?;
    if magic != TOC_MAGIC {
        return Err(Error::driver_mismatch("pipeline library TOC magic mismatch"));
    }
    let version = r.read_u32()?;
    if version != TOC_VERSION {
        return Err(Error::driver_mismatch("pipeline library TOC version mismatch"));
    }
    let vendor_id = r.read_u32()?;
    let device_id = r.read_u32()?;
    let spirv_count = r.read_u32()? as usize;
    let driver_cache_count = r.read_u32()? as usize;
    let pipeline_count = r.read_u32()? as usize;
    let build_tag = r.read_u64()?;
    let shader_interface_key = r.read_u64()?;
    let uuid_bytes = r.read_bytes(16)?;
    let mut uuid = [0u8; 16];
    uuid.copy_from_slice(uuid_bytes);

    let total = spirv_count + driver_cache_count + pipeline_count;
    let mut raw = Vec::with_capacity(total);
    for _ in 0..total {
        raw.push(read_raw_entry(&mut r)?);
    }

    let mut entries = Vec::with_capacity(total);
    for e in &raw {
        let key = if e.name_length == 0 {
            LibraryKey::InternalHash(r.read_u64()?)
        } else {
            let bytes = r.read_bytes(e.name_length as usize * 2)?;
            let mut units = Vec::with_capacity(e.name_length as usize);
            for chunk in bytes.chunks_exact(2) {
                units.push(u16::from_le_bytes([chunk[0], chunk[1]]));
            }
            LibraryKey::Name(units)
        };
        entries.push(key);
    }

    let mut out = Vec::with_capacity(total);
    for (key, e) in entries.into_iter().zip(raw.iter()) {
        let body = data
            .get(e.blob_offset as usize..e.blob_offset as usize + e.blob_length as usize)
            .ok_or_else(|| Error::invalid_argument("TOC blob offset out of bounds"))?;
        out.push(TocEntry {
            key,
            data: body.to_vec(),
        });
    }

    let pipelines = out.split_off(spirv_count + driver_cache_count);
    let driver_cache = out.split_off(spirv_count);
    let spirv = out;

    Ok((
        TocHeader {
            vendor_id,
            device_id,
            build_tag,
            shader_interface_key,
            uuid,
        },
        spirv,
        driver_cache,
        pipelines,
    ))
}
