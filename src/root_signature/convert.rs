use crate::error::{Error, Result};

use super::types::*;

const LEGACY_RANGE_FLAGS: DescriptorRangeFlags =
    DescriptorRangeFlags::DESCRIPTORS_VOLATILE.union(DescriptorRangeFlags::DATA_VOLATILE);
const LEGACY_DESCRIPTOR_FLAGS: RootDescriptorFlags = RootDescriptorFlags::DATA_VOLATILE;

fn convert_payload(payload: &RootParameterPayload, target: RootSignatureVersion) -> RootParameterPayload {
    match payload {
        RootParameterPayload::DescriptorTable(table) => {
            let ranges = table
                .ranges
                .iter()
                .map(|r| DescriptorRange {
                    flags: match target {
                        RootSignatureVersion::V1_0 => DescriptorRangeFlags::NONE,
                        RootSignatureVersion::V1_1 | RootSignatureVersion::V1_2 => {
                            if r.flags.is_empty() {
                                LEGACY_RANGE_FLAGS
                            } else {
                                r.flags
                            }
                        }
                    },
                    ..*r
                })
                .collect();
            RootParameterPayload::DescriptorTable(DescriptorTable { ranges })
        }
        RootParameterPayload::Constants(c) => RootParameterPayload::Constants(*c),
        RootParameterPayload::Cbv(d) => RootParameterPayload::Cbv(convert_descriptor(d, target)),
        RootParameterPayload::Srv(d) => RootParameterPayload::Srv(convert_descriptor(d, target)),
        RootParameterPayload::Uav(d) => RootParameterPayload::Uav(convert_descriptor(d, target)),
    }
}

fn convert_descriptor(d: &RootDescriptor, target: RootSignatureVersion) -> RootDescriptor {
    RootDescriptor {
        flags: match target {
            RootSignatureVersion::V1_0 => RootDescriptorFlags::NONE,
            RootSignatureVersion::V1_1 | RootSignatureVersion::V1_2 => {
                if d.flags.is_empty() {
                    LEGACY_DESCRIPTOR_FLAGS
                } else {
                    d.flags
                }
            }
        },
        ..*d
    }
}

fn convert_static_sampler(s: &StaticSampler, target: RootSignatureVersion) -> StaticSampler {
    StaticSampler {
        flags: match target {
            RootSignatureVersion::V1_2 => s.flags,
            RootSignatureVersion::V1_0 | RootSignatureVersion::V1_1 => StaticSamplerFlags::NONE,
        },
        ..*s
    }
}

/// Convert `desc` to `target`. Downward conversion (v1.1/v1.2 → v1.0, or
/// v1.2 → v1.1) drops per-range/descriptor/sampler `flags`; upward
/// conversion synthesises the legacy-equivalent flags (spec.md §4.5).
/// Converting to the same version is rejected.
pub fn convert_root_signature(desc: &RootSignatureDesc, target: RootSignatureVersion) -> Result<RootSignatureDesc> {
    if desc.version == target {
        return Err(Error::invalid_argument(
            "root signature is already at the requested version",
        ));
    }

    let parameters = desc
        .parameters
        .iter()
        .map(|p| RootParameter {
            visibility: p.visibility,
            payload: convert_payload(&p.payload, target),
        })
        .collect();

    let static_samplers = desc
        .static_samplers
        .iter()
        .map(|s| convert_static_sampler(s, target))
        .collect();

    Ok(RootSignatureDesc {
        version: target,
        parameters,
        static_samplers,
        flags: desc.flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_cbv_table_desc(version: RootSignatureVersion, flags: DescriptorRangeFlags) -> RootSignatureDesc {
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
                        flags,
                    }],
                }),
            }],
            static_samplers: Vec::new(),
            flags: RootSignatureFlags::NONE,
        }
    }

    #[test]
    fn upward_conversion_synthesises_legacy_flags() {
        let v1_0 = one_cbv_table_desc(RootSignatureVersion::V1_0, DescriptorRangeFlags::NONE);
        let v1_1 = convert_root_signature(&v1_0, RootSignatureVersion::V1_1).unwrap();
        match &v1_1.parameters[0].payload {
            RootParameterPayload::DescriptorTable(t) => {
                assert_eq!(t.ranges[0].flags, LEGACY_RANGE_FLAGS);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn downward_conversion_drops_flags() {
        let v1_1 = one_cbv_table_desc(RootSignatureVersion::V1_1, LEGACY_RANGE_FLAGS);
        let v1_0 = convert_root_signature(&v1_1, RootSignatureVersion::V1_0).unwrap();
        match &v1_0.parameters[0].payload {
            RootParameterPayload::DescriptorTable(t) => {
                assert_eq!(t.ranges[0].flags, DescriptorRangeFlags::NONE);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn round_trip_down_and_up_restores_legacy_flags() {
        let v1_0 = one_cbv_table_desc(RootSignatureVersion::V1_0, DescriptorRangeFlags::NONE);
        let v1_1 = convert_root_signature(&v1_0, RootSignatureVersion::V1_1).unwrap();
        let back = convert_root_signature(&v1_1, RootSignatureVersion::V1_0).unwrap();
        match &back.parameters[0].payload {
            RootParameterPayload::DescriptorTable(t) => {
                assert_eq!(t.ranges[0].flags, DescriptorRangeFlags::NONE);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn same_version_conversion_fails() {
        let desc = one_cbv_table_desc(RootSignatureVersion::V1_0, DescriptorRangeFlags::NONE);
        assert!(convert_root_signature(&desc, RootSignatureVersion::V1_0).is_err());
    }
}
