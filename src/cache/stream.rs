//! Append-only stream-archive format (spec.md §4.8 "Persistence", `VKS4`):
//! the on-disk format the background worker (`worker.rs`) actually writes
//! to, one record per newly observed unique blob.
use crate::error::{Error, Result};
use crate::fnv::fnv1_64;
use crate::io::{Reader, Writer};

pub const STREAM_MAGIC: u32 = 0x3453_4b56; // "VKS4" little-endian
const STREAM_VERSION: u32 = 1;
pub const STREAM_HEADER_SIZE: usize = 4 + 4 + 4 + 4 + 8 + 8 + 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub vendor_id: u32,
    pub device_id: u32,
    pub build_tag: u64,
    pub shader_interface_key: u64,
    pub uuid: [u8; 16],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Spirv,
    DriverCache,
    Pipeline,
}

impl RecordType {
    fn to_u32(self) -> u32 {
        match self {
            RecordType::Spirv => 0,
            RecordType::DriverCache => 1,
            RecordType::Pipeline => 2,
        }
    }

    fn from_u32(v: u32) -> Option<RecordType> {
        match v {
            0 => Some(RecordType::Spirv),
            1 => Some(RecordType::DriverCache),
            2 => Some(RecordType::Pipeline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamRecord {
    pub hash: u64,
    pub record_type: RecordType,
    pub data: Vec<u8>,
}

pub fn write_stream_header(w: &mut Writer, header: &StreamHeader) {
    w.write_u32(STREAM_MAGIC);
    w.write_u32(STREAM_VERSION);
    w.write_u32(header.vendor_id);
    w.write_u32(header.device_id);
    w.write_u64(header.build_tag);
    w.write_u64(header.shader_interface_key);
    w.write_bytes(&header.uuid);
}

pub fn read_stream_header(data: &[u8]) -> Result<StreamHeader> {
    if data.len() < STREAM_HEADER_SIZE {
        return Err(Error::driver_mismatch("stream archive too short for header"));
    }
    let mut r = Reader::new(data);
    let magic = r.read_u32()?;
    if magic != STREAM_MAGIC {
        return Err(Error::driver_mismatch("stream archive magic mismatch"));
    }
    let version = r.read_u32()?;
    if version != STREAM_VERSION {
        return Err(Error::driver_mismatch("stream archive version mismatch"));
    }
    let vendor_id = r.read_u32()?;
    let device_id = r.read_u32()?;
    let build_tag = r.read_u64()?;
    let shader_interface_key = r.read_u64()?;
    let uuid_bytes = r.read_bytes(16)?;
    let mut uuid = [0u8; 16];
    uuid.copy_from_slice(uuid_bytes);
    Ok(StreamHeader {
        vendor_id,
        device_id,
        build_tag,
        shader_interface_key,
        uuid,
    })
}

fn record_checksum(hash: u64, record_type: RecordType, data: &[u8]) -> u64 {
    let mut w = Writer::with_capacity(8 + 4 + data.len());
    w.write_u64(hash);
    w.write_u32(record_type.to_u32());
    w.write_u32(data.len() as u32);
    w.write_bytes(data);
    fnv1_64(&w.into_bytes())
}

/// Appends one record to an already-positioned writer, returning nothing:
/// the caller owns flushing to disk.
pub fn append_record(w: &mut Writer, hash: u64, record_type: RecordType, data: &[u8]) {
    w.write_u64(hash);
    w.write_u64(record_checksum(hash, record_type, data));
    w.write_u32(data.len() as u32);
    w.write_u32(record_type.to_u32());
    w.write_bytes(data);
    w.align_to(8);
}

/// Reads every record following the header. Stops (without failing) at the
/// first corrupt or truncated record, per spec.md §4.8 "Stream-archive
/// corruption mid-file → silently truncate replay to last good record".
pub fn read_stream_records(data: &[u8]) -> Vec<StreamRecord> {
    let mut records = Vec::new();
    let mut r = Reader::at(data, STREAM_HEADER_SIZE);
    loop {
        if r.is_empty() {
            break;
        }
        let record = match read_one_record(&mut r) {
            Some(record) => record,
            None => break,
        };
        records.push(record);
    }
    records
}

fn read_one_record(r: &mut Reader<'_>) -> Option<StreamRecord> {
    let hash = r.read_u64().ok()?;
    let checksum = r.read_u64().ok()?;
    let size = r.read_u32().ok()? as usize;
    let type_word = r.read_u32().ok()?;
    let record_type = RecordType::from_u32(type_word)?;
    let data = r.read_bytes(size).ok()?.to_vec();
    if record_checksum(hash, record_type, &data) != checksum {
        return None;
    }
    let pad = (8 - (size % 8)) % 8;
    if pad > 0 {
        r.skip(pad).ok()?;
    }
    Some(StreamRecord {
        hash,
        record_type,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> StreamHeader {
        StreamHeader {
            vendor_id: 1,
            device_id: 2,
            build_tag: 3,
            shader_interface_key: 4,
            uuid: [7u8; 16],
        }
    }

    #[test]
    fn round_trips_several_records() {
        let mut w = Writer::new();
        write_stream_header(&mut w, &header());
        append_record(&mut w, 111, RecordType::Spirv, &[1, 2, 3]);
        append_record(&mut w, 222, RecordType::DriverCache, &[4, 5]);
        let bytes = w.into_bytes();

        assert_eq!(read_stream_header(&bytes).unwrap(), header());
        let records = read_stream_records(&bytes);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].hash, 111);
        assert_eq!(records[0].data, vec![1, 2, 3]);
        assert_eq!(records[1].record_type, RecordType::DriverCache);
    }

    #[test]
    fn truncates_replay_at_first_corrupt_record() {
        let mut w = Writer::new();
        write_stream_header(&mut w, &header());
        append_record(&mut w, 1, RecordType::Spirv, &[0xaa; 4]);
        let good_len = w.position();
        append_record(&mut w, 2, RecordType::Spirv, &[0xbb; 4]);
        let mut bytes = w.into_bytes();
        // corrupt the second record's checksum field
        bytes[good_len + 8] ^= 0xff;

        let records = read_stream_records(&bytes);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hash, 1);
    }

    #[test]
    fn truncated_file_mid_record_stops_cleanly() {
        let mut w = Writer::new();
        write_stream_header(&mut w, &header());
        append_record(&mut w, 1, RecordType::Spirv, &[0xaa; 4]);
        let mut bytes = w.into_bytes();
        bytes.truncate(bytes.len() - 2);
        let records = read_stream_records(&bytes);
        assert!(records.is_empty());
    }
}
