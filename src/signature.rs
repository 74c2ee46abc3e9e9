//! Input/output/patch-constant signature chunk decoding (C4).
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::dxbc::{TAG_ISG1, TAG_ISGN, TAG_OSG1, TAG_OSG5, TAG_OSGN, TAG_PCSG, TAG_PSG1};
use crate::error::{Error, Result};
use crate::io::Reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u32)]
pub enum SysValSemantic {
    None = 0,
    Position = 1,
    ClipDistance = 2,
    CullDistance = 3,
    RenderTargetArrayIndex = 4,
    ViewportArrayIndex = 5,
    VertexId = 6,
    PrimitiveId = 7,
    InstanceId = 8,
    IsFrontFace = 9,
    SampleIndex = 10,
    FinalQuadEdgeTessFactor = 11,
    FinalQuadInsideTessFactor = 12,
    FinalTriEdgeTessFactor = 13,
    FinalTriInsideTessFactor = 14,
    FinalLineDetailTessFactor = 15,
    FinalLineDensityTessFactor = 16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u32)]
pub enum ComponentType {
    Void = 0,
    Uint = 1,
    Int = 2,
    Float = 3,
    Bool = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u32)]
pub enum MinPrecision {
    None = 0,
    Float16 = 1,
    Float2_8 = 2,
    Reserved = 3,
    Int16 = 4,
    Uint16 = 5,
}

/// One row of a signature chunk.
#[derive(Debug, Clone, Copy)]
pub struct SignatureElement<'a> {
    pub semantic_name: &'a str,
    pub semantic_index: u32,
    pub stream_index: u32,
    pub sysval_semantic: SysValSemantic,
    pub component_type: ComponentType,
    pub register_index: u32,
    /// Read mask in the low byte, write mask in bits 8..16.
    pub mask: u32,
    pub min_precision: MinPrecision,
}

impl<'a> SignatureElement<'a> {
    pub fn read_mask(&self) -> u8 {
        (self.mask & 0xff) as u8
    }
    pub fn write_mask(&self) -> u8 {
        ((self.mask >> 8) & 0xff) as u8
    }
}

#[derive(Debug, Clone, Default)]
pub struct Signature<'a> {
    pub elements: Vec<SignatureElement<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowLayout {
    /// `ISGN`/`OSGN`/`PCSG`: no stream index, no min precision.
    V0,
    /// `OSG5`: explicit stream index, no min precision.
    V5,
    /// `ISG1`/`OSG1`/`PSG1`: explicit stream index and min precision.
    V1,
}

fn row_layout_for_tag(tag: [u8; 4]) -> Result<RowLayout> {
    match tag {
        t if t == TAG_ISGN || t == TAG_OSGN || t == TAG_PCSG => Ok(RowLayout::V0),
        t if t == TAG_OSG5 => Ok(RowLayout::V5),
        t if t == TAG_ISG1 || t == TAG_OSG1 || t == TAG_PSG1 => Ok(RowLayout::V1),
        _ => Err(Error::invalid_argument("not a signature chunk tag")),
    }
}

fn read_enum<E: FromPrimitive>(v: u32, what: &'static str) -> Result<E> {
    E::from_u32(v).ok_or_else(|| Error::invalid_argument(format!("invalid {} value {}", what, v)))
}

/// Parse a signature chunk's payload. `tag` selects the row layout
/// (spec.md §4.4). Duplicate chunks are the caller's concern — this
/// function just decodes one chunk; `Dxbc::parse`'s handler is responsible
/// for letting a later chunk replace an earlier one.
pub fn parse_signature(tag: [u8; 4], data: &[u8]) -> Result<Signature<'_>> {
    let layout = row_layout_for_tag(tag)?;
    let mut r = Reader::new(data);
    let count = r.read_u32()? as usize;
    let _ignored = r.read_u32()?;

    let mut elements = Vec::with_capacity(count);
    for _ in 0..count {
        let stream_index = if layout != RowLayout::V0 { r.read_u32()? } else { 0 };
        let name_offset = r.read_u32()?;
        let semantic_index = r.read_u32()?;
        let sysval_semantic = read_enum(r.read_u32()?, "sysval semantic")?;
        let component_type = read_enum(r.read_u32()?, "component type")?;
        let register_index = r.read_u32()?;
        let mask = r.read_u32()?;
        let min_precision = if layout == RowLayout::V1 {
            read_enum(r.read_u32()?, "min precision")?
        } else {
            MinPrecision::None
        };

        let semantic_name = r.get_cstring(name_offset as usize)?;

        elements.push(SignatureElement {
            semantic_name,
            semantic_index,
            stream_index,
            sysval_semantic,
            component_type,
            register_index,
            mask,
            min_precision,
        });
    }

    Ok(Signature { elements })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_v0_chunk(elements: &[(&str, u32, SysValSemantic, u32, u32)]) -> Vec<u8> {
        // Layout: count, ignored, then rows, then a name blob at the end.
        let mut rows = Vec::new();
        let mut names = Vec::new();
        let header_len = 8 + elements.len() * 6 * 4;
        for (name, sem_idx, sysval, reg, mask) in elements {
            let name_offset = header_len + names.len();
            rows.extend_from_slice(&(name_offset as u32).to_le_bytes());
            rows.extend_from_slice(&sem_idx.to_le_bytes());
            rows.extend_from_slice(&(*sysval as u32).to_le_bytes());
            rows.extend_from_slice(&(ComponentType::Float as u32).to_le_bytes());
            rows.extend_from_slice(&reg.to_le_bytes());
            rows.extend_from_slice(&mask.to_le_bytes());
            names.extend_from_slice(name.as_bytes());
            names.push(0);
        }
        let mut data = Vec::new();
        data.extend_from_slice(&(elements.len() as u32).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&rows);
        data.extend_from_slice(&names);
        data
    }

    #[test]
    fn parses_isgn_two_elements() {
        let data = build_v0_chunk(&[
            ("POSITION", 0, SysValSemantic::Position, 0, 0x0f0f),
            ("COLOR", 0, SysValSemantic::None, 1, 0x0f0f),
        ]);
        let sig = parse_signature(TAG_ISGN, &data).unwrap();
        assert_eq!(sig.elements.len(), 2);
        assert_eq!(sig.elements[0].semantic_name, "POSITION");
        assert_eq!(sig.elements[0].sysval_semantic, SysValSemantic::Position);
        assert_eq!(sig.elements[0].stream_index, 0);
        assert_eq!(sig.elements[1].semantic_name, "COLOR");
        assert_eq!(sig.elements[1].read_mask(), 0x0f);
        assert_eq!(sig.elements[1].write_mask(), 0x0f);
    }

    #[test]
    fn missing_nul_terminator_fails() {
        let mut data = build_v0_chunk(&[("POSITION", 0, SysValSemantic::Position, 0, 0xff)]);
        let last = data.len() - 1;
        data.truncate(last); // drop the NUL
        assert!(parse_signature(TAG_ISGN, &data).is_err());
    }

    #[test]
    fn rejects_non_signature_tag() {
        assert!(parse_signature(*b"SHEX", &[]).is_err());
    }
}
