use crate::error::{Error, Result};
use crate::io::{require_space, Reader};

use super::types::*;

fn read_enum<T>(v: u32, from_u32: impl Fn(u32) -> Option<T>, what: &'static str) -> Result<T> {
    from_u32(v).ok_or_else(|| Error::invalid_argument(format!("invalid {} value {:#x}", what, v)))
}

fn parse_descriptor_ranges(
    r: &Reader,
    offset: usize,
    count: usize,
    has_flags: bool,
) -> Result<Vec<DescriptorRange>> {
    let words_per_range = if has_flags { 6 } else { 5 };
    if !require_space(offset, count * words_per_range, 4, r.full_data().len()) {
        return Err(Error::invalid_argument("descriptor range array out of bounds"));
    }
    let mut cr = Reader::at(r.full_data(), offset);
    let mut ranges = Vec::with_capacity(count);
    for _ in 0..count {
        let range_type = read_enum(cr.read_u32()?, DescriptorRangeType::from_u32, "descriptor range type")?;
        let descriptor_count = cr.read_u32()?;
        let base_shader_register = cr.read_u32()?;
        let register_space = cr.read_u32()?;
        let flags = if has_flags {
            DescriptorRangeFlags::from_bits_truncate(cr.read_u32()?)
        } else {
            DescriptorRangeFlags::NONE
        };
        let _table_offset = cr.read_u32()?;
        ranges.push(DescriptorRange {
            range_type,
            descriptor_count,
            base_shader_register,
            register_space,
            flags,
        });
    }
    Ok(ranges)
}

fn parse_descriptor_table(r: &Reader, offset: usize, has_flags: bool) -> Result<DescriptorTable> {
    if !require_space(offset, 2, 4, r.full_data().len()) {
        return Err(Error::invalid_argument("descriptor table header out of bounds"));
    }
    let mut cr = Reader::at(r.full_data(), offset);
    let count = cr.read_u32()? as usize;
    let ranges_offset = cr.read_u32()? as usize;
    let ranges = parse_descriptor_ranges(r, ranges_offset, count, has_flags)?;
    Ok(DescriptorTable { ranges })
}

fn parse_root_constants(r: &Reader, offset: usize) -> Result<RootConstants> {
    if !require_space(offset, 3, 4, r.full_data().len()) {
        return Err(Error::invalid_argument("root constants out of bounds"));
    }
    let mut cr = Reader::at(r.full_data(), offset);
    Ok(RootConstants {
        shader_register: cr.read_u32()?,
        register_space: cr.read_u32()?,
        value_count: cr.read_u32()?,
    })
}

fn parse_root_descriptor(r: &Reader, offset: usize, has_flags: bool) -> Result<RootDescriptor> {
    let words = if has_flags { 3 } else { 2 };
    if !require_space(offset, words, 4, r.full_data().len()) {
        return Err(Error::invalid_argument("root descriptor out of bounds"));
    }
    let mut cr = Reader::at(r.full_data(), offset);
    let shader_register = cr.read_u32()?;
    let register_space = cr.read_u32()?;
    let flags = if has_flags {
        RootDescriptorFlags::from_bits_truncate(cr.read_u32()?)
    } else {
        RootDescriptorFlags::NONE
    };
    Ok(RootDescriptor {
        shader_register,
        register_space,
        flags,
    })
}

fn parse_parameters(r: &Reader, offset: usize, count: usize, has_flags: bool) -> Result<Vec<RootParameter>> {
    if !require_space(offset, count * 3, 4, r.full_data().len()) {
        return Err(Error::invalid_argument("root parameter array out of bounds"));
    }
    let mut cr = Reader::at(r.full_data(), offset);
    let mut parameters = Vec::with_capacity(count);
    for _ in 0..count {
        let parameter_type = read_enum(cr.read_u32()?, RootParameterType::from_u32, "root parameter type")?;
        let visibility = read_enum(cr.read_u32()?, ShaderVisibility::from_u32, "shader visibility")?;
        let body_offset = cr.read_u32()? as usize;

        let payload = match parameter_type {
            RootParameterType::DescriptorTable => {
                RootParameterPayload::DescriptorTable(parse_descriptor_table(r, body_offset, has_flags)?)
            }
            RootParameterType::Constants32Bit => {
                RootParameterPayload::Constants(parse_root_constants(r, body_offset)?)
            }
            RootParameterType::Cbv => RootParameterPayload::Cbv(parse_root_descriptor(r, body_offset, has_flags)?),
            RootParameterType::Srv => RootParameterPayload::Srv(parse_root_descriptor(r, body_offset, has_flags)?),
            RootParameterType::Uav => RootParameterPayload::Uav(parse_root_descriptor(r, body_offset, has_flags)?),
        };
        parameters.push(RootParameter { visibility, payload });
    }
    Ok(parameters)
}

fn parse_static_sampler(cr: &mut Reader, versioned_flags: bool) -> Result<StaticSampler> {
    let filter = cr.read_u32()?;
    let address_u = cr.read_u32()?;
    let address_v = cr.read_u32()?;
    let address_w = cr.read_u32()?;
    let mip_lod_bias = cr.read_f32()?;
    let max_anisotropy = cr.read_u32()?;
    let comparison_func = cr.read_u32()?;
    let border_color = cr.read_u32()?;
    let min_lod = cr.read_f32()?;
    let max_lod = cr.read_f32()?;
    let shader_register = cr.read_u32()?;
    let register_space = cr.read_u32()?;
    let shader_visibility = read_enum(cr.read_u32()?, ShaderVisibility::from_u32, "shader visibility")?;
    let flags = if versioned_flags {
        StaticSamplerFlags::from_bits_truncate(cr.read_u32()?)
    } else {
        StaticSamplerFlags::NONE
    };
    Ok(StaticSampler {
        filter,
        address_u,
        address_v,
        address_w,
        mip_lod_bias,
        max_anisotropy,
        comparison_func,
        border_color,
        min_lod,
        max_lod,
        shader_register,
        register_space,
        shader_visibility,
        flags,
    })
}

fn parse_static_samplers(r: &Reader, offset: usize, count: usize, versioned_flags: bool) -> Result<Vec<StaticSampler>> {
    let words_per_sampler = if versioned_flags { 14 } else { 13 };
    if !require_space(offset, count * words_per_sampler, 4, r.full_data().len()) {
        return Err(Error::invalid_argument("static sampler array out of bounds"));
    }
    let mut cr = Reader::at(r.full_data(), offset);
    let mut samplers = Vec::with_capacity(count);
    for _ in 0..count {
        samplers.push(parse_static_sampler(&mut cr, versioned_flags)?);
    }
    Ok(samplers)
}

/// Parse a raw `RTS0` payload (the bytes inside the chunk, not the outer
/// DXBC container) into a [`RootSignatureDesc`], along with the content
/// hash of the raw payload used for pipeline-compatibility comparisons.
pub fn parse_root_signature(data: &[u8]) -> Result<(RootSignatureDesc, u64)> {
    if !require_space(0, 6, 4, data.len()) {
        return Err(Error::invalid_argument("root signature payload too short"));
    }
    let r = Reader::new(data);
    let mut header = Reader::new(data);
    let version = read_enum(header.read_u32()?, RootSignatureVersion::from_u32, "root signature version")?;
    let has_flags = !matches!(version, RootSignatureVersion::V1_0);

    let parameter_count = header.read_u32()? as usize;
    let parameter_offset = header.read_u32()? as usize;
    let sampler_count = header.read_u32()? as usize;
    let sampler_offset = header.read_u32()? as usize;
    let flags = RootSignatureFlags::from_bits_truncate(header.read_u32()?);

    let parameters = if parameter_count > 0 {
        parse_parameters(&r, parameter_offset, parameter_count, has_flags)?
    } else {
        Vec::new()
    };
    let versioned_sampler_flags = matches!(version, RootSignatureVersion::V1_2);
    let static_samplers = if sampler_count > 0 {
        parse_static_samplers(&r, sampler_offset, sampler_count, versioned_sampler_flags)?
    } else {
        Vec::new()
    };

    let desc = RootSignatureDesc {
        version,
        parameters,
        static_samplers,
        flags,
    };
    let hash = crate::fnv::fnv1_64(data);
    Ok((desc, hash))
}
