//! Versioned root-signature data model (C5).
use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootSignatureVersion {
    V1_0,
    V1_1,
    V1_2,
}

impl RootSignatureVersion {
    pub fn from_u32(v: u32) -> Option<RootSignatureVersion> {
        match v {
            0x1 => Some(RootSignatureVersion::V1_0),
            0x2 => Some(RootSignatureVersion::V1_1),
            0x3 => Some(RootSignatureVersion::V1_2),
            _ => None,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            RootSignatureVersion::V1_0 => 0x1,
            RootSignatureVersion::V1_1 => 0x2,
            RootSignatureVersion::V1_2 => 0x3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderVisibility {
    All = 0,
    Vertex = 1,
    Hull = 2,
    Domain = 3,
    Geometry = 4,
    Pixel = 5,
    Compute = 1000000000,
}

impl ShaderVisibility {
    pub fn from_u32(v: u32) -> Option<ShaderVisibility> {
        match v {
            0 => Some(ShaderVisibility::All),
            1 => Some(ShaderVisibility::Vertex),
            2 => Some(ShaderVisibility::Hull),
            3 => Some(ShaderVisibility::Domain),
            4 => Some(ShaderVisibility::Geometry),
            5 => Some(ShaderVisibility::Pixel),
            1000000000 => Some(ShaderVisibility::Compute),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorRangeType {
    Srv = 0,
    Uav = 1,
    Cbv = 2,
    Sampler = 3,
}

impl DescriptorRangeType {
    pub fn from_u32(v: u32) -> Option<DescriptorRangeType> {
        match v {
            0 => Some(DescriptorRangeType::Srv),
            1 => Some(DescriptorRangeType::Uav),
            2 => Some(DescriptorRangeType::Cbv),
            3 => Some(DescriptorRangeType::Sampler),
            _ => None,
        }
    }

    pub fn is_sampler(self) -> bool {
        matches!(self, DescriptorRangeType::Sampler)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootParameterType {
    DescriptorTable = 0,
    Constants32Bit = 1,
    Cbv = 2,
    Srv = 3,
    Uav = 4,
}

impl RootParameterType {
    pub fn from_u32(v: u32) -> Option<RootParameterType> {
        match v {
            0 => Some(RootParameterType::DescriptorTable),
            1 => Some(RootParameterType::Constants32Bit),
            2 => Some(RootParameterType::Cbv),
            3 => Some(RootParameterType::Srv),
            4 => Some(RootParameterType::Uav),
            _ => None,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RootSignatureFlags: u32 {
        const NONE = 0;
        const ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT = 0x1;
        const DENY_VERTEX_SHADER_ROOT_ACCESS = 0x2;
        const DENY_HULL_SHADER_ROOT_ACCESS = 0x4;
        const DENY_DOMAIN_SHADER_ROOT_ACCESS = 0x8;
        const DENY_GEOMETRY_SHADER_ROOT_ACCESS = 0x10;
        const DENY_PIXEL_SHADER_ROOT_ACCESS = 0x20;
        const ALLOW_STREAM_OUTPUT = 0x40;
        const LOCAL_ROOT_SIGNATURE = 0x80;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorRangeFlags: u32 {
        const NONE = 0;
        const DESCRIPTORS_VOLATILE = 0x1;
        const DATA_VOLATILE = 0x2;
        const DATA_STATIC_WHILE_SET_AT_EXECUTE = 0x4;
        const DATA_STATIC = 0x8;
        const DESCRIPTORS_STATIC_KEEPING_BUFFER_BOUNDS_CHECKS = 0x10000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RootDescriptorFlags: u32 {
        const NONE = 0;
        const DATA_VOLATILE = 0x2;
        const DATA_STATIC_WHILE_SET_AT_EXECUTE = 0x4;
        const DATA_STATIC = 0x8;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StaticSamplerFlags: u32 {
        const NONE = 0;
        const UNNORMALIZED_COORDINATES = 0x1;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DescriptorRange {
    pub range_type: DescriptorRangeType,
    pub descriptor_count: u32,
    pub base_shader_register: u32,
    pub register_space: u32,
    pub flags: DescriptorRangeFlags,
}

#[derive(Debug, Clone)]
pub struct DescriptorTable {
    pub ranges: Vec<DescriptorRange>,
}

impl DescriptorTable {
    /// Either every range is a sampler range or none is.
    pub fn is_uniform(&self) -> bool {
        let samplers = self.ranges.iter().filter(|r| r.range_type.is_sampler()).count();
        samplers == 0 || samplers == self.ranges.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RootConstants {
    pub shader_register: u32,
    pub register_space: u32,
    pub value_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RootDescriptor {
    pub shader_register: u32,
    pub register_space: u32,
    pub flags: RootDescriptorFlags,
}

#[derive(Debug, Clone)]
pub enum RootParameterPayload {
    DescriptorTable(DescriptorTable),
    Constants(RootConstants),
    Cbv(RootDescriptor),
    Srv(RootDescriptor),
    Uav(RootDescriptor),
}

#[derive(Debug, Clone)]
pub struct RootParameter {
    pub visibility: ShaderVisibility,
    pub payload: RootParameterPayload,
}

impl RootParameter {
    pub fn parameter_type(&self) -> RootParameterType {
        match &self.payload {
            RootParameterPayload::DescriptorTable(_) => RootParameterType::DescriptorTable,
            RootParameterPayload::Constants(_) => RootParameterType::Constants32Bit,
            RootParameterPayload::Cbv(_) => RootParameterType::Cbv,
            RootParameterPayload::Srv(_) => RootParameterType::Srv,
            RootParameterPayload::Uav(_) => RootParameterType::Uav,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StaticSampler {
    pub filter: u32,
    pub address_u: u32,
    pub address_v: u32,
    pub address_w: u32,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison_func: u32,
    pub border_color: u32,
    pub min_lod: f32,
    pub max_lod: f32,
    pub shader_register: u32,
    pub register_space: u32,
    pub shader_visibility: ShaderVisibility,
    pub flags: StaticSamplerFlags,
}

#[derive(Debug, Clone)]
pub struct RootSignatureDesc {
    pub version: RootSignatureVersion,
    pub parameters: Vec<RootParameter>,
    pub static_samplers: Vec<StaticSampler>,
    pub flags: RootSignatureFlags,
}
