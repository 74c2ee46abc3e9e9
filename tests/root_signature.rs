//! End-to-end coverage across the DXBC container (C3) and root-signature
//! codec (C5): serialising a description through the public façade, reading
//! it back, converting versions, and checking validation failures surface
//! through `serialize_root_signature` rather than only the raw validator.
use vkshade::dxbc::TAG_RTS0;
use vkshade::root_signature::{
    convert_root_signature, DescriptorRange, DescriptorRangeFlags, DescriptorRangeType,
    DescriptorTable, RootParameter, RootParameterPayload, RootSignatureDesc, RootSignatureFlags,
    RootSignatureVersion, ShaderVisibility,
};

fn one_cbv_table_desc(version: RootSignatureVersion) -> RootSignatureDesc {
    RootSignatureDesc {
        version,
        parameters: vec![RootParameter {
            visibility: ShaderVisibility::Pixel,
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
fn round_trips_through_a_real_dxbc_container() {
    let desc = one_cbv_table_desc(RootSignatureVersion::V1_0);
    let dxbc = vkshade::root_signature::serialize_root_signature(&desc).unwrap();

    // A root signature serialised by this crate reads back through the
    // public façade, not just the module-internal raw parser.
    let (parsed, _hash) = vkshade::api::extract_root_signature(&dxbc).unwrap();
    assert_eq!(parsed.version, RootSignatureVersion::V1_0);
    assert_eq!(parsed.parameters.len(), 1);
    match &parsed.parameters[0].payload {
        RootParameterPayload::DescriptorTable(t) => {
            assert_eq!(t.ranges[0].range_type, DescriptorRangeType::Cbv);
            assert_eq!(t.ranges[0].flags, DescriptorRangeFlags::NONE);
        }
        _ => panic!("expected a descriptor table parameter"),
    }
}

#[test]
fn extract_root_signature_requires_an_rts0_chunk() {
    let dxbc = vkshade::dxbc::serialize_dxbc(vec![(&vkshade::dxbc::TAG_ISGN, &b""[..])]);
    assert!(vkshade::api::extract_root_signature(&dxbc).is_err());
}

#[test]
fn version_round_trip_down_and_up_restores_legacy_flags_at_the_container_level() {
    let v1_0 = one_cbv_table_desc(RootSignatureVersion::V1_0);
    let v1_1 = convert_root_signature(&v1_0, RootSignatureVersion::V1_1).unwrap();

    // Upward conversion synthesises DESCRIPTORS_VOLATILE | DATA_VOLATILE for
    // a range that previously carried no flags at all (spec.md §8 scenario 3).
    match &v1_1.parameters[0].payload {
        RootParameterPayload::DescriptorTable(t) => {
            assert_eq!(
                t.ranges[0].flags,
                DescriptorRangeFlags::DESCRIPTORS_VOLATILE | DescriptorRangeFlags::DATA_VOLATILE
            );
        }
        _ => panic!("expected a descriptor table parameter"),
    }

    let dxbc = vkshade::root_signature::serialize_root_signature(&v1_1).unwrap();
    let (reparsed, _hash) = vkshade::api::extract_root_signature(&dxbc).unwrap();
    assert_eq!(reparsed.version, RootSignatureVersion::V1_1);

    let back_down = convert_root_signature(&reparsed, RootSignatureVersion::V1_0).unwrap();
    match &back_down.parameters[0].payload {
        RootParameterPayload::DescriptorTable(t) => {
            assert_eq!(t.ranges[0].flags, DescriptorRangeFlags::NONE);
        }
        _ => panic!("expected a descriptor table parameter"),
    }
}

#[test]
fn mixed_sampler_table_is_rejected_before_serialisation() {
    let desc = RootSignatureDesc {
        version: RootSignatureVersion::V1_0,
        parameters: vec![RootParameter {
            visibility: ShaderVisibility::All,
            payload: RootParameterPayload::DescriptorTable(DescriptorTable {
                ranges: vec![
                    DescriptorRange {
                        range_type: DescriptorRangeType::Sampler,
                        descriptor_count: 1,
                        base_shader_register: 0,
                        register_space: 0,
                        flags: DescriptorRangeFlags::NONE,
                    },
                    DescriptorRange {
                        range_type: DescriptorRangeType::Cbv,
                        descriptor_count: 1,
                        base_shader_register: 0,
                        register_space: 0,
                        flags: DescriptorRangeFlags::NONE,
                    },
                ],
            }),
        }],
        static_samplers: Vec::new(),
        flags: RootSignatureFlags::NONE,
    };
    assert!(vkshade::root_signature::serialize_root_signature(&desc).is_err());
}

#[test]
fn converting_to_the_same_version_is_rejected() {
    let desc = one_cbv_table_desc(RootSignatureVersion::V1_2);
    assert!(convert_root_signature(&desc, RootSignatureVersion::V1_2).is_err());
}

#[test]
fn serialized_container_carries_the_rts0_tag() {
    let desc = one_cbv_table_desc(RootSignatureVersion::V1_0);
    let dxbc = vkshade::root_signature::serialize_root_signature(&desc).unwrap();
    let mut seen = Vec::new();
    vkshade::dxbc::parse_dxbc(&dxbc, |chunk| {
        seen.push(chunk.tag);
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, vec![TAG_RTS0]);
}
