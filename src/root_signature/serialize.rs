use crate::dxbc::{serialize_dxbc, TAG_RTS0};
use crate::io::Writer;

use super::types::*;
use super::validate::validate_root_signature;
use crate::error::Result;

fn has_flags(version: RootSignatureVersion) -> bool {
    !matches!(version, RootSignatureVersion::V1_0)
}

fn write_descriptor_ranges(w: &mut Writer, ranges: &[DescriptorRange], with_flags: bool) {
    for range in ranges {
        w.write_u32(range.range_type as u32);
        w.write_u32(range.descriptor_count);
        w.write_u32(range.base_shader_register);
        w.write_u32(range.register_space);
        if with_flags {
            w.write_u32(range.flags.bits());
        }
        w.write_u32(0xffff_ffff); // D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND
    }
}

fn write_descriptor_table(w: &mut Writer, table: &DescriptorTable, with_flags: bool) {
    let count_at = w.reserve(4);
    let offset_at = w.reserve(4);
    w.patch_u32(count_at, table.ranges.len() as u32);
    let ranges_offset = w.position() as u32;
    w.patch_u32(offset_at, ranges_offset);
    write_descriptor_ranges(w, &table.ranges, with_flags);
}

fn write_root_descriptor(w: &mut Writer, d: &RootDescriptor, with_flags: bool) {
    w.write_u32(d.shader_register);
    w.write_u32(d.register_space);
    if with_flags {
        w.write_u32(d.flags.bits());
    }
}

fn write_parameter_body(w: &mut Writer, param: &RootParameter, with_flags: bool) {
    match &param.payload {
        RootParameterPayload::DescriptorTable(table) => write_descriptor_table(w, table, with_flags),
        RootParameterPayload::Constants(c) => {
            w.write_u32(c.shader_register);
            w.write_u32(c.register_space);
            w.write_u32(c.value_count);
        }
        RootParameterPayload::Cbv(d) | RootParameterPayload::Srv(d) | RootParameterPayload::Uav(d) => {
            write_root_descriptor(w, d, with_flags)
        }
    }
}

fn write_static_sampler(w: &mut Writer, s: &StaticSampler, with_flags: bool) {
    w.write_u32(s.filter);
    w.write_u32(s.address_u);
    w.write_u32(s.address_v);
    w.write_u32(s.address_w);
    w.write_f32(s.mip_lod_bias);
    w.write_u32(s.max_anisotropy);
    w.write_u32(s.comparison_func);
    w.write_u32(s.border_color);
    w.write_f32(s.min_lod);
    w.write_f32(s.max_lod);
    w.write_u32(s.shader_register);
    w.write_u32(s.register_space);
    w.write_u32(s.shader_visibility as u32);
    if with_flags {
        w.write_u32(s.flags.bits());
    }
}

/// Serialise a [`RootSignatureDesc`] into a raw `RTS0` payload (no outer
/// DXBC container).
pub fn serialize_root_signature_raw(desc: &RootSignatureDesc) -> Result<Vec<u8>> {
    validate_root_signature(desc)?;

    let with_flags = has_flags(desc.version);
    let versioned_sampler_flags = matches!(desc.version, RootSignatureVersion::V1_2);

    let mut w = Writer::new();
    w.write_u32(desc.version.to_u32());
    w.write_u32(desc.parameters.len() as u32);
    let parameter_offset_at = w.reserve(4);
    w.write_u32(desc.static_samplers.len() as u32);
    let sampler_offset_at = w.reserve(4);
    w.write_u32(desc.flags.bits());

    let parameter_offset = w.position() as u32;
    w.patch_u32(parameter_offset_at, parameter_offset);

    // Pointer array first: (type, visibility, body_offset) per parameter,
    // with body_offset patched once each body is written.
    let mut body_offset_ats = Vec::with_capacity(desc.parameters.len());
    for param in &desc.parameters {
        w.write_u32(param.parameter_type() as u32);
        w.write_u32(param.visibility as u32);
        body_offset_ats.push(w.reserve(4));
    }
    for (param, offset_at) in desc.parameters.iter().zip(body_offset_ats) {
        let body_offset = w.position() as u32;
        w.patch_u32(offset_at, body_offset);
        write_parameter_body(&mut w, param, with_flags);
    }

    let sampler_offset = w.position() as u32;
    w.patch_u32(sampler_offset_at, sampler_offset);
    for sampler in &desc.static_samplers {
        write_static_sampler(&mut w, sampler, versioned_sampler_flags);
    }

    Ok(w.into_bytes())
}

/// Serialise a [`RootSignatureDesc`] into a complete DXBC container with a
/// single `RTS0` chunk, recomputing the container checksum.
pub fn serialize_root_signature(desc: &RootSignatureDesc) -> Result<Vec<u8>> {
    let payload = serialize_root_signature_raw(desc)?;
    Ok(serialize_dxbc(vec![(&TAG_RTS0, payload.as_slice())]))
}

#[cfg(test)]
mod tests {
    use super::super::parse::parse_root_signature;
    use super::*;

    fn minimal_desc(version: RootSignatureVersion) -> RootSignatureDesc {
        RootSignatureDesc {
            version,
            parameters: vec![RootParameter {
                visibility: ShaderVisibility::All,
                payload: RootParameterPayload::DescriptorTable(DescriptorTable {
                    ranges: vec![DescriptorRange {
                        range_type: DescriptorRangeType::Cbv,
                        descriptor_count: 1,
                        base_shader_register: 0,
                        register_space: 0,
                        flags: DescriptorRangeFlags::NONE,
                    }],
                }),
            }],
            static_samplers: Vec::new(),
            flags: RootSignatureFlags::NONE,
        }
    }

    #[test]
    fn round_trips_through_raw_parse() {
        let desc = minimal_desc(RootSignatureVersion::V1_0);
        let raw = serialize_root_signature_raw(&desc).unwrap();
        let (parsed, _hash) = parse_root_signature(&raw).unwrap();
        assert_eq!(parsed.version, RootSignatureVersion::V1_0);
        assert_eq!(parsed.parameters.len(), 1);
    }

    #[test]
    fn empty_signature_serialises_to_header_only_payload() {
        let desc = RootSignatureDesc {
            version: RootSignatureVersion::V1_0,
            parameters: Vec::new(),
            static_samplers: Vec::new(),
            flags: RootSignatureFlags::NONE,
        };
        let raw = serialize_root_signature_raw(&desc).unwrap();
        assert_eq!(raw.len(), 6 * 4);
    }

    #[test]
    fn wraps_in_a_valid_dxbc_container() {
        let desc = minimal_desc(RootSignatureVersion::V1_1);
        let dxbc = serialize_root_signature(&desc).unwrap();
        assert_eq!(&dxbc[0..4], b"DXBC");
    }
}
