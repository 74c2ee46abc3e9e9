//! In-memory pipeline library (spec.md §4.8): de-duplicated internal
//! stores for SPIR-V and driver-cache blobs, plus the application-visible
//! name→blob map. Grounded on the cache patterns in `attackgoat-screen-13`'s
//! `hash_pool.rs` (hashmap-of-`Arc<Mutex<_>>` caches guarded by
//! `parking_lot`) generalised to this crate's two-lock scheme (spec.md §5
//! "Concurrency").
use std::collections::HashMap;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::blob::{
    self, Chunk, ChunkKind, ChunkTag, CompatRecord, PipelineBlobHeader, MAX_STAGES,
};
use crate::cache::key::LibraryKey;
use crate::cache::stream::RecordType;
use crate::cache::toc::{self, TocEntry, TocHeader};
use crate::cache::varint;
use crate::error::{Error, Result};

/// A lock-free, install-once slot for a driver pipeline handle re-handed to
/// concurrent `LoadPipeline` calls (spec.md §4.8 "Concurrency" — "hot
/// entries ... use a lock-free compare-exchange ... losing threads release
/// their instance").
pub struct HotSlot<T> {
    ptr: AtomicPtr<T>,
}

impl<T> HotSlot<T> {
    pub fn new() -> HotSlot<T> {
        HotSlot {
            ptr: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Returns the already-installed value, or installs `make()`'s result
    /// as the first creator and returns that instead if another thread won
    /// the race.
    pub fn get_or_install(&self, make: impl FnOnce() -> Arc<T>) -> Arc<T> {
        let existing = self.ptr.load(Ordering::Acquire);
        if !existing.is_null() {
            unsafe {
                Arc::increment_strong_count(existing);
                return Arc::from_raw(existing);
            }
        }
        let candidate = Arc::into_raw(make()) as *mut T;
        match self
            .ptr
            .compare_exchange(ptr::null_mut(), candidate, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => unsafe {
                Arc::increment_strong_count(candidate);
                Arc::from_raw(candidate)
            },
            Err(winner) => unsafe {
                drop(Arc::from_raw(candidate)); // we lost the race, release our instance
                Arc::increment_strong_count(winner);
                Arc::from_raw(winner)
            },
        }
    }
}

impl<T> Default for HotSlot<T> {
    fn default() -> HotSlot<T> {
        HotSlot::new()
    }
}

impl<T> Drop for HotSlot<T> {
    fn drop(&mut self) {
        let p = *self.ptr.get_mut();
        if !p.is_null() {
            unsafe {
                drop(Arc::from_raw(p));
            }
        }
    }
}

pub struct Entry<P> {
    pub blob: Vec<u8>,
    pub compat: CompatRecord,
    pub hot: HotSlot<P>,
}

#[derive(Default)]
struct InternalStores {
    spirv_cache: HashMap<u64, Vec<u8>>,
    driver_cache: HashMap<u64, Vec<u8>>,
}

/// One stage's SPIR-V and auxiliary metadata, as handed to
/// [`PipelineLibrary::store_pipeline`].
pub struct StageContents<'a> {
    pub stage: u16,
    pub spirv: &'a [u32],
    pub metadata: Option<&'a [u8]>,
    pub identifier_hash: Option<u64>,
}

pub struct PipelineLibrary<P> {
    header: PipelineBlobHeader,
    internal: RwLock<InternalStores>,
    pso_map: RwLock<HashMap<LibraryKey, Arc<Entry<P>>>>,
}

impl<P> PipelineLibrary<P> {
    pub fn new(header: PipelineBlobHeader) -> PipelineLibrary<P> {
        PipelineLibrary {
            header,
            internal: RwLock::new(InternalStores::default()),
            pso_map: RwLock::new(HashMap::new()),
        }
    }

    pub fn header(&self) -> &PipelineBlobHeader {
        &self.header
    }

    fn intern_spirv(&self, words: &[u32]) -> (u64, bool) {
        let encoded = varint::encode_words(words);
        let (hash, wrapped) = blob::wrap_internal_blob(&encoded);
        let mut internal = self.internal.write();
        let is_new = !internal.spirv_cache.contains_key(&hash);
        internal.spirv_cache.entry(hash).or_insert(wrapped);
        (hash, is_new)
    }

    fn intern_driver_cache(&self, data: &[u8]) -> (u64, bool) {
        let (hash, wrapped) = blob::wrap_internal_blob(data);
        let mut internal = self.internal.write();
        let is_new = !internal.driver_cache.contains_key(&hash);
        internal.driver_cache.entry(hash).or_insert(wrapped);
        (hash, is_new)
    }

    /// Assembles the application-visible blob for one pipeline, deduplicating
    /// its SPIR-V and driver-cache payloads into the internal stores, and
    /// inserts it under `key`. Fails with *invalid argument* if `key` is
    /// already present (spec.md §4.8 "Duplicate name on store").
    pub fn store_pipeline(
        &self,
        key: LibraryKey,
        compat: CompatRecord,
        stages: &[StageContents<'_>],
        driver_cache: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        {
            let pso_map = self.pso_map.read();
            if pso_map.contains_key(&key) {
                return Err(Error::invalid_argument("duplicate pipeline name"));
            }
        }

        let mut chunks = vec![Chunk {
            tag: ChunkTag::new(ChunkKind::CompatRecord, 0),
            data: compat.to_bytes(),
        }];

        for stage in stages {
            let (hash, _is_new) = self.intern_spirv(stage.spirv);
            chunks.push(Chunk {
                tag: ChunkTag::new(ChunkKind::SpirvLink, stage.stage),
                data: hash.to_le_bytes().to_vec(),
            });
            if let Some(metadata) = stage.metadata {
                chunks.push(Chunk {
                    tag: ChunkTag::new(ChunkKind::ShaderMetadata, stage.stage),
                    data: metadata.to_vec(),
                });
            }
            if let Some(id_hash) = stage.identifier_hash {
                chunks.push(Chunk {
                    tag: ChunkTag::new(ChunkKind::ShaderIdentifier, stage.stage),
                    data: id_hash.to_le_bytes().to_vec(),
                });
            }
        }

        if let Some(driver_cache) = driver_cache {
            let (hash, _is_new) = self.intern_driver_cache(driver_cache);
            chunks.push(Chunk {
                tag: ChunkTag::new(ChunkKind::DriverCacheLink, 0),
                data: hash.to_le_bytes().to_vec(),
            });
        }

        let blob = blob::serialize_pipeline_blob(&self.header, &chunks);

        let mut pso_map = self.pso_map.write();
        if pso_map.contains_key(&key) {
            return Err(Error::invalid_argument("duplicate pipeline name"));
        }
        pso_map.insert(
            key,
            Arc::new(Entry {
                blob: blob.clone(),
                compat,
                hot: HotSlot::new(),
            }),
        );
        Ok(blob)
    }

    /// Fails with *invalid argument* if `key` is absent or its stored
    /// compatibility record disagrees with `compat` (spec.md §4.8
    /// "Keying and compatibility").
    pub fn load_pipeline(&self, key: &LibraryKey, compat: &CompatRecord) -> Result<Vec<u8>> {
        let pso_map = self.pso_map.read();
        let entry = pso_map
            .get(key)
            .ok_or_else(|| Error::invalid_argument("no pipeline stored under this key"))?;
        if &entry.compat != compat {
            return Err(Error::invalid_argument("pipeline compatibility mismatch"));
        }
        Ok(entry.blob.clone())
    }

    /// Returns the stored entry for `key`, so the caller can race
    /// [`HotSlot::get_or_install`] against other threads loading the same
    /// pipeline and converge on one driver object.
    pub fn pipeline_entry(&self, key: &LibraryKey) -> Option<Arc<Entry<P>>> {
        self.pso_map.read().get(key).cloned()
    }

    /// Replays a de-duplicated record recovered from the on-disk stream
    /// archive into the internal stores, as the background worker does on
    /// startup (spec.md §4.8 "Background worker" step 2).
    pub fn replay_internal_record(&self, record_type: RecordType, hash: u64, data: Vec<u8>) {
        let mut internal = self.internal.write();
        match record_type {
            RecordType::Spirv => {
                internal.spirv_cache.entry(hash).or_insert(data);
            }
            RecordType::DriverCache => {
                internal.driver_cache.entry(hash).or_insert(data);
            }
            RecordType::Pipeline => {
                drop(internal);
                self.replay_pipeline_record(hash, data);
            }
        }
    }

    fn replay_pipeline_record(&self, hash: u64, data: Vec<u8>) {
        let compat = match blob::parse_pipeline_blob(&data) {
            Ok((_, chunks)) => chunks
                .iter()
                .find(|c| c.tag.kind == ChunkKind::CompatRecord)
                .and_then(|c| CompatRecord::from_bytes(&c.data).ok()),
            Err(_) => None,
        };
        let compat = match compat {
            Some(compat) => compat,
            None => return,
        };
        let key = LibraryKey::InternalHash(hash);
        let mut pso_map = self.pso_map.write();
        pso_map.entry(key).or_insert_with(|| {
            Arc::new(Entry {
                blob: data,
                compat,
                hot: HotSlot::new(),
            })
        });
    }

    pub fn spirv_cache_len(&self) -> usize {
        self.internal.read().spirv_cache.len()
    }

    pub fn driver_cache_len(&self) -> usize {
        self.internal.read().driver_cache.len()
    }

    pub fn pso_count(&self) -> usize {
        self.pso_map.read().len()
    }

    /// Serialises the whole library to the monolithic TOC format (spec.md
    /// §4.8 "Monolithic TOC format"), for an application's explicit
    /// `Serialize` call.
    pub fn export_toc(&self) -> Vec<u8> {
        let internal = self.internal.read();
        let spirv: Vec<TocEntry> = internal
            .spirv_cache
            .iter()
            .map(|(&hash, data)| TocEntry {
                key: LibraryKey::InternalHash(hash),
                data: data.clone(),
            })
            .collect();
        let driver_cache: Vec<TocEntry> = internal
            .driver_cache
            .iter()
            .map(|(&hash, data)| TocEntry {
                key: LibraryKey::InternalHash(hash),
                data: data.clone(),
            })
            .collect();
        drop(internal);

        let pipelines: Vec<TocEntry> = self
            .pso_map
            .read()
            .iter()
            .map(|(key, entry)| TocEntry {
                key: key.clone(),
                data: entry.blob.clone(),
            })
            .collect();

        let toc_header = TocHeader {
            vendor_id: self.header.vendor_id,
            device_id: self.header.device_id,
            build_tag: self.header.build_tag,
            shader_interface_key: self.header.shader_interface_key,
            uuid: self.header.uuid,
        };
        toc::serialize_toc(&toc_header, &spirv, &driver_cache, &pipelines)
    }

    /// Replays a monolithic TOC buffer (spec.md §4.8 "Monolithic TOC
    /// format") into this library's internal stores and `pso_map`. Fails
    /// with [`Error::AdapterNotFound`] if the TOC's vendor/device id
    /// disagrees with this library's own header (spec.md §8 scenario 5).
    pub fn load_toc(&self, data: &[u8]) -> Result<()> {
        let (toc_header, spirv, driver_cache, pipelines) = toc::parse_toc(data)?;
        if toc_header.vendor_id != self.header.vendor_id || toc_header.device_id != self.header.device_id {
            return Err(Error::AdapterNotFound);
        }

        let mut internal = self.internal.write();
        for entry in spirv {
            if let LibraryKey::InternalHash(hash) = entry.key {
                internal.spirv_cache.entry(hash).or_insert(entry.data);
            }
        }
        for entry in driver_cache {
            if let LibraryKey::InternalHash(hash) = entry.key {
                internal.driver_cache.entry(hash).or_insert(entry.data);
            }
        }
        drop(internal);

        let mut pso_map = self.pso_map.write();
        for entry in pipelines {
            let compat = CompatRecord::from_bytes(
                &blob::parse_pipeline_blob(&entry.data)?
                    .1
                    .iter()
                    .find(|c| c.tag.kind == ChunkKind::CompatRecord)
                    .ok_or_else(|| Error::invalid_argument("pipeline blob missing compat record"))?
                    .data,
            )?;
            pso_map.entry(entry.key).or_insert_with(|| {
                Arc::new(Entry {
                    blob: entry.data,
                    compat,
                    hot: HotSlot::new(),
                })
            });
        }
        Ok(())
    }
}

/// Mixes every state-description field into a single FNV-1 hash (spec.md
/// §4.8 "state_desc_compat_hash"). Callers pass the fields in a stable
/// order; string fields (input-layout semantic names) are hashed byte-wise.
pub fn state_desc_compat_hash(fields: &[&[u8]]) -> u64 {
    let mut hash = crate::fnv::fnv1_64(&[]);
    for field in fields {
        hash = crate::fnv::fnv1_64_continue(hash, field);
    }
    hash
}

pub fn dxbc_blob_hashes(per_stage: &[&[u8]]) -> [u64; MAX_STAGES] {
    let mut hashes = [0u64; MAX_STAGES];
    for (i, stage_bytes) in per_stage.iter().enumerate().take(MAX_STAGES) {
        hashes[i] = CompatRecord::stage_hash(i, stage_bytes);
    }
    hashes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> PipelineBlobHeader {
        PipelineBlobHeader {
            vendor_id: 1,
            device_id: 2,
            build_tag: 3,
            shader_interface_key: 4,
            uuid: [0u8; 16],
        }
    }

    fn compat() -> CompatRecord {
        CompatRecord {
            state_desc_compat_hash: 1,
            root_signature_compat_hash: 2,
            dxbc_blob_hashes: [0; MAX_STAGES],
        }
    }

    #[test]
    fn stores_and_loads_a_pipeline() {
        let lib: PipelineLibrary<()> = PipelineLibrary::new(header());
        let stages = [StageContents {
            stage: 0,
            spirv: &[0x0723_0203, 1, 2, 3],
            metadata: None,
            identifier_hash: None,
        }];
        let blob = lib
            .store_pipeline(LibraryKey::from_str("main_vs"), compat(), &stages, None)
            .unwrap();
        let loaded = lib.load_pipeline(&LibraryKey::from_str("main_vs"), &compat()).unwrap();
        assert_eq!(blob, loaded);
        assert_eq!(lib.spirv_cache_len(), 1);
    }

    #[test]
    fn duplicate_name_store_fails() {
        let lib: PipelineLibrary<()> = PipelineLibrary::new(header());
        let stages = [StageContents {
            stage: 0,
            spirv: &[1, 2],
            metadata: None,
            identifier_hash: None,
        }];
        lib.store_pipeline(LibraryKey::from_str("x"), compat(), &stages, None)
            .unwrap();
        let err = lib
            .store_pipeline(LibraryKey::from_str("x"), compat(), &stages, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn compat_mismatch_on_load_fails() {
        let lib: PipelineLibrary<()> = PipelineLibrary::new(header());
        let stages = [StageContents {
            stage: 0,
            spirv: &[1, 2],
            metadata: None,
            identifier_hash: None,
        }];
        lib.store_pipeline(LibraryKey::from_str("x"), compat(), &stages, None)
            .unwrap();
        let mut other = compat();
        other.state_desc_compat_hash = 0xdead;
        let err = lib.load_pipeline(&LibraryKey::from_str("x"), &other).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn identical_spirv_across_pipelines_deduplicates() {
        let lib: PipelineLibrary<()> = PipelineLibrary::new(header());
        let stages = [StageContents {
            stage: 0,
            spirv: &[7, 7, 7],
            metadata: None,
            identifier_hash: None,
        }];
        lib.store_pipeline(LibraryKey::from_str("a"), compat(), &stages, None)
            .unwrap();
        lib.store_pipeline(LibraryKey::from_str("b"), compat(), &stages, None)
            .unwrap();
        assert_eq!(lib.spirv_cache_len(), 1);
        assert_eq!(lib.pso_count(), 2);
    }

    #[test]
    fn hot_slot_converges_concurrent_installs() {
        let slot: HotSlot<u32> = HotSlot::new();
        let a = slot.get_or_install(|| Arc::new(1));
        let b = slot.get_or_install(|| Arc::new(2));
        assert_eq!(*a, 1);
        assert_eq!(*b, 1);
    }

    #[test]
    fn export_then_load_toc_round_trips_a_pipeline() {
        let lib: PipelineLibrary<()> = PipelineLibrary::new(header());
        let stages = [StageContents {
            stage: 0,
            spirv: &[0x0723_0203, 1, 2, 3],
            metadata: None,
            identifier_hash: None,
        }];
        lib.store_pipeline(LibraryKey::from_str("shader_a"), compat(), &stages, None)
            .unwrap();
        let toc = lib.export_toc();

        let reopened: PipelineLibrary<()> = PipelineLibrary::new(header());
        reopened.load_toc(&toc).unwrap();
        let loaded = reopened
            .load_pipeline(&LibraryKey::from_str("shader_a"), &compat())
            .unwrap();
        assert_eq!(loaded, lib.load_pipeline(&LibraryKey::from_str("shader_a"), &compat()).unwrap());

        let mut mismatched = compat();
        mismatched.state_desc_compat_hash ^= 0xff;
        assert!(reopened
            .load_pipeline(&LibraryKey::from_str("shader_a"), &mismatched)
            .is_err());
    }

    #[test]
    fn load_toc_rejects_vendor_id_mismatch() {
        let lib: PipelineLibrary<()> = PipelineLibrary::new(header());
        let toc = lib.export_toc();

        let mut other_header = header();
        other_header.vendor_id = 0xdead;
        let other: PipelineLibrary<()> = PipelineLibrary::new(other_header);
        let err = other.load_toc(&toc).unwrap_err();
        assert!(matches!(err, Error::AdapterNotFound));
    }
}
