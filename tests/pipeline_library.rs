//! End-to-end coverage of the pipeline-state cache/library (C8) through its
//! public surface: storing a pipeline, loading it back under a matching and
//! a mismatched compatibility record, and the monolithic-TOC serialise /
//! reopen round trip a real application's explicit `Serialize` call exercises
//! (spec.md §8 scenario 5).
use vkshade::cache::{CompatRecord, LibraryKey, PipelineBlobHeader, PipelineLibrary, StageContents, MAX_STAGES};
use vkshade::Error;

fn header() -> PipelineBlobHeader {
    PipelineBlobHeader {
        vendor_id: 0x10de,
        device_id: 0x2684,
        build_tag: 42,
        shader_interface_key: 7,
        uuid: [9u8; 16],
    }
}

fn compat() -> CompatRecord {
    CompatRecord {
        state_desc_compat_hash: 0x1111,
        root_signature_compat_hash: 0x2222,
        dxbc_blob_hashes: [0; MAX_STAGES],
    }
}

#[test]
fn stores_and_reloads_a_pipeline_under_a_matching_compat_record() {
    let library: PipelineLibrary<()> = PipelineLibrary::new(header());
    let stages = [StageContents {
        stage: 0,
        spirv: &[0x0723_0203, 1, 2, 3, 4],
        metadata: None,
        identifier_hash: None,
    }];
    let stored = library
        .store_pipeline(LibraryKey::from_str("main_ps"), compat(), &stages, None)
        .unwrap();
    let loaded = library.load_pipeline(&LibraryKey::from_str("main_ps"), &compat()).unwrap();
    assert_eq!(stored, loaded);
}

#[test]
fn compat_mismatch_on_load_is_an_invalid_argument() {
    let library: PipelineLibrary<()> = PipelineLibrary::new(header());
    let stages = [StageContents {
        stage: 0,
        spirv: &[1, 2, 3],
        metadata: None,
        identifier_hash: None,
    }];
    library
        .store_pipeline(LibraryKey::from_str("main_ps"), compat(), &stages, None)
        .unwrap();

    let mut mismatched = compat();
    mismatched.root_signature_compat_hash ^= 0xff;
    let err = library
        .load_pipeline(&LibraryKey::from_str("main_ps"), &mismatched)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn serialize_and_reopen_round_trips_the_whole_library() {
    let library: PipelineLibrary<()> = PipelineLibrary::new(header());
    let stages = [StageContents {
        stage: 0,
        spirv: &[0x0723_0203, 5, 6, 7],
        metadata: None,
        identifier_hash: None,
    }];
    library
        .store_pipeline(LibraryKey::from_str("shader_a"), compat(), &stages, None)
        .unwrap();

    // Scenario 5: a whole-library `Serialize` followed by reopening a fresh
    // library under the same device identity from that buffer.
    let serialized = library.export_toc();
    let reopened: PipelineLibrary<()> = PipelineLibrary::new(header());
    reopened.load_toc(&serialized).unwrap();

    let original = library.load_pipeline(&LibraryKey::from_str("shader_a"), &compat()).unwrap();
    let restored = reopened.load_pipeline(&LibraryKey::from_str("shader_a"), &compat()).unwrap();
    assert_eq!(original, restored);
    assert_eq!(reopened.spirv_cache_len(), library.spirv_cache_len());
}

#[test]
fn reopening_under_a_mismatched_compat_record_fails() {
    let library: PipelineLibrary<()> = PipelineLibrary::new(header());
    let stages = [StageContents {
        stage: 0,
        spirv: &[1, 1, 1],
        metadata: None,
        identifier_hash: None,
    }];
    library
        .store_pipeline(LibraryKey::from_str("shader_a"), compat(), &stages, None)
        .unwrap();
    let serialized = library.export_toc();

    let reopened: PipelineLibrary<()> = PipelineLibrary::new(header());
    reopened.load_toc(&serialized).unwrap();

    let mut mismatched = compat();
    mismatched.state_desc_compat_hash ^= 0xdead;
    assert!(reopened
        .load_pipeline(&LibraryKey::from_str("shader_a"), &mismatched)
        .is_err());
}

#[test]
fn reopening_under_a_different_adapter_reports_adapter_not_found() {
    let library: PipelineLibrary<()> = PipelineLibrary::new(header());
    let serialized = library.export_toc();

    let mut other_header = header();
    other_header.vendor_id = 0x1002; // a different vendor id entirely
    let other_device: PipelineLibrary<()> = PipelineLibrary::new(other_header);
    let err = other_device.load_toc(&serialized).unwrap_err();
    assert!(matches!(err, Error::AdapterNotFound));
}
