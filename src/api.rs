//! Public API façade (C9): the narrow set of entry points that compose
//! C3–C8. A real FFI boundary (the "C-ABI-shaped structs with a type tag
//! and a next extension pointer" spec.md §6 describes) is a separate,
//! unsafe veneer outside this crate's scope; everything here is the safe
//! Rust surface that veneer would call into.
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bitflags::bitflags;
use spirv_headers::ExecutionModel;

use crate::cache::{
    self, CachePaths, LibraryKey, PipelineLibrary, StreamHeader, WorkerHandle,
};
use crate::compiler::{Compiler, Instruction};
use crate::dxbc::{self, TAG_DXIL, TAG_RTS0, TAG_SHDR, TAG_SHEX};
use crate::error::{Error, Result};
use crate::root_signature::{self, RootSignatureDesc};
use crate::signature::{self, Signature};

bitflags! {
    /// Immutable options threaded through one compile/parse session
    /// (spec.md §6 CLI surface, §9 "Global mutable state" — neither flag is
    /// a process-global; both are constructor arguments here).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CoreConfig: u32 {
        const NONE = 0;
        /// Omit the SPIR-V debug sub-stream (`OpName`/friends) from compile
        /// output. Mirrors the CLI's `--strip-debug`.
        const STRIP_DEBUG = 0x1;
        /// Lower a bound `uav` buffer resource as a Vulkan storage buffer
        /// rather than a buffer-texture. Mirrors the CLI's
        /// `--buffer-uav=storage-buffer`.
        const BUFFER_UAV_AS_STORAGE_BUFFER = 0x2;
    }
}

/// The external TPF decoder contract (spec.md §6 "Shader source token
/// reader"), rendered as a trait rather than the three free functions the
/// spec describes, since that's the idiomatic shape for a caller-supplied
/// strategy in Rust. This crate never implements TPF decoding itself.
pub trait TpfReader {
    fn decode(&self, shader_body: &[u8]) -> Result<Vec<Instruction>>;
}

/// Scans `dxbc` for a chunk whose tag is `DXIL`; when present the shader
/// must be delegated to an external DXIL→SPIR-V translator instead of the
/// TPF path below (spec.md §6 "DXIL detection").
pub fn shader_is_dxil(dxbc: &[u8]) -> bool {
    dxbc::shader_is_dxil(dxbc)
}

/// Compiles a DXBC-wrapped shader to SPIR-V. Fails with
/// [`Error::InvalidShader`] if the blob is a DXIL shader (the caller must
/// delegate those externally), or if no `SHDR`/`SHEX` body chunk is found.
pub fn compile_shader(
    dxbc: &[u8],
    execution_model: ExecutionModel,
    decoder: &dyn TpfReader,
    config: CoreConfig,
) -> Result<Vec<u32>> {
    if shader_is_dxil(dxbc) {
        return Err(Error::invalid_shader(
            "DXIL shaders must be delegated to the external translator",
        ));
    }

    let mut body = None;
    dxbc::parse_dxbc(dxbc, |chunk| {
        if chunk.tag == TAG_SHEX || chunk.tag == TAG_SHDR {
            body = Some(chunk.data.to_vec());
        }
        Ok(())
    })?;
    let body = body.ok_or_else(|| Error::invalid_shader("no shader body chunk found"))?;

    let instructions = decoder.decode(&body)?;
    let compiler = Compiler::new(execution_model);
    Ok(if config.contains(CoreConfig::STRIP_DEBUG) {
        compiler.compile_stripped(&instructions)
    } else {
        compiler.compile(&instructions)
    })
}

/// Extracts and parses an `RTS0` root-signature chunk, returning the
/// parsed description and its raw-payload compatibility hash (spec.md
/// §4.8's `root_signature_compat_hash`).
pub fn extract_root_signature(dxbc: &[u8]) -> Result<(RootSignatureDesc, u64)> {
    let mut payload = None;
    dxbc::parse_dxbc(dxbc, |chunk| {
        if chunk.tag == TAG_RTS0 {
            payload = Some(chunk.data.to_vec());
        }
        Ok(())
    })?;
    let payload = payload.ok_or_else(|| Error::invalid_argument("no RTS0 chunk found"))?;
    root_signature::parse_root_signature(&payload)
}

/// Extracts and parses whichever input/output/patch-constant signature
/// chunk is present among `tags`, in order, returning the first found. The
/// returned [`Signature`] borrows directly from `dxbc`.
pub fn extract_signature<'a>(dxbc: &'a [u8], tags: &[[u8; 4]]) -> Result<Signature<'a>> {
    let mut found: Option<([u8; 4], &'a [u8])> = None;
    dxbc::parse_dxbc(dxbc, |chunk| {
        if found.is_none() && tags.contains(&chunk.tag) {
            found = Some((chunk.tag, chunk.data));
        }
        Ok(())
    })?;
    let (tag, data) = found.ok_or_else(|| Error::invalid_argument("no matching signature chunk found"))?;
    signature::parse_signature(tag, data)
}

/// One stage's shader body bytes and execution model, bundled for
/// [`compat_record_for_stages`].
pub struct StageInput<'a> {
    pub dxbc: &'a [u8],
}

/// Builds the PSO-compatibility record (spec.md §4.8 "Keying and
/// compatibility") from a pipeline-state description hash, the bound root
/// signature's compat hash (or `fallback_root_signature_hash` when none is
/// bound), and the per-stage DXBC bytes.
pub fn compat_record_for_stages(
    state_desc_compat_hash: u64,
    root_signature_compat_hash: Option<u64>,
    fallback_root_signature_hash: u64,
    stages: &[StageInput<'_>],
) -> cache::CompatRecord {
    let per_stage: Vec<&[u8]> = stages.iter().map(|s| s.dxbc).collect();
    cache::CompatRecord {
        state_desc_compat_hash,
        root_signature_compat_hash: root_signature_compat_hash.unwrap_or(fallback_root_signature_hash),
        dxbc_blob_hashes: cache::dxbc_blob_hashes(&per_stage),
    }
}

const CACHE_FILE_STEM: &str = "vkshade-proton";

/// A disk-backed pipeline cache: the in-memory library plus the background
/// worker that keeps its stream-archive format up to date on disk.
pub struct DiskCache<P> {
    pub library: Arc<PipelineLibrary<P>>,
    worker: Option<WorkerHandle>,
}

impl<P: Send + Sync + 'static> DiskCache<P> {
    /// Opens (or creates) a disk cache rooted at `VKD3D_SHADER_CACHE_PATH`,
    /// read once here rather than cached in a global (spec.md §6
    /// "Environment variables", §9 "Global mutable state" — this entry
    /// point is the one place the process environment is consulted).
    /// `app_name`, when given, is appended to the cache file stem so
    /// multiple applications don't collide on one cache directory.
    pub fn open(
        header: crate::cache::PipelineBlobHeader,
        app_name: Option<&str>,
    ) -> DiskCache<P> {
        let dir = env::var_os("VKD3D_SHADER_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let stem = match app_name {
            Some(name) => format!("{}.{}", CACHE_FILE_STEM, name),
            None => CACHE_FILE_STEM.to_string(),
        };

        let paths = CachePaths {
            write_cache: cache_path(&dir, &stem, "write"),
            read_cache: cache_path(&dir, &stem, ""),
            merge_cache: cache_path(&dir, &stem, "merge"),
        };

        let stream_header = StreamHeader {
            vendor_id: header.vendor_id,
            device_id: header.device_id,
            build_tag: header.build_tag,
            shader_interface_key: header.shader_interface_key,
            uuid: header.uuid,
        };

        let library = Arc::new(PipelineLibrary::new(header));
        let worker = cache::spawn(Arc::clone(&library), paths, stream_header);
        DiskCache {
            library,
            worker: Some(worker),
        }
    }

    /// Notifies the background worker of a newly created internal-store
    /// record so it gets appended to the write-cache. Called after a
    /// successful [`PipelineLibrary::store_pipeline`].
    pub fn notify_new_record(&self, hash: u64, record_type: cache::RecordType, data: Vec<u8>) {
        if let Some(worker) = &self.worker {
            worker.submit(hash, record_type, data);
        }
    }

    /// Serialises the whole library to the monolithic TOC format (spec.md
    /// §4.8 "Monolithic TOC format"), used by the application's explicit
    /// `Serialize` call.
    pub fn serialize(&self) -> Vec<u8> {
        self.library.export_toc()
    }

    /// Replays a buffer previously produced by [`DiskCache::serialize`]
    /// (spec.md §8 scenario 5 "re-open with the serialised buffer").
    pub fn load_toc(&self, data: &[u8]) -> Result<()> {
        self.library.load_toc(data)
    }

    pub fn load_pipeline(&self, key: &LibraryKey, compat: &cache::CompatRecord) -> Result<Vec<u8>> {
        self.library.load_pipeline(key, compat)
    }
}

impl<P> Drop for DiskCache<P> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

fn cache_path(dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    let file_name = if suffix.is_empty() {
        format!("{}.cache", stem)
    } else {
        format!("{}.cache.{}", stem, suffix)
    };
    dir.join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDecoder(Vec<Instruction>);
    impl TpfReader for FixedDecoder {
        fn decode(&self, _shader_body: &[u8]) -> Result<Vec<Instruction>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn compile_shader_rejects_dxil() {
        let dxbc = dxbc::serialize_dxbc(vec![(&TAG_DXIL, &b"whatever"[..])]);
        let decoder = FixedDecoder(vec![]);
        let err = compile_shader(&dxbc, ExecutionModel::Fragment, &decoder, CoreConfig::NONE).unwrap_err();
        assert!(matches!(err, Error::InvalidShader(_)));
    }

    #[test]
    fn compile_shader_requires_a_body_chunk() {
        let dxbc = dxbc::serialize_dxbc(vec![(&crate::dxbc::TAG_ISGN, &b""[..])]);
        let decoder = FixedDecoder(vec![]);
        let err = compile_shader(&dxbc, ExecutionModel::Fragment, &decoder, CoreConfig::NONE).unwrap_err();
        assert!(matches!(err, Error::InvalidShader(_)));
    }

    #[test]
    fn extracts_root_signature_chunk() {
        use crate::root_signature::{RootParameter, RootSignatureDesc, RootSignatureFlags, RootSignatureVersion, ShaderVisibility};
        let desc = RootSignatureDesc {
            version: RootSignatureVersion::V1_0,
            parameters: Vec::<RootParameter>::new(),
            static_samplers: Vec::new(),
            flags: RootSignatureFlags::NONE,
        };
        let rts0 = root_signature::serialize_root_signature(&desc).unwrap();
        let (parsed, _hash) = extract_root_signature(&rts0).unwrap();
        assert_eq!(parsed.version, RootSignatureVersion::V1_0);
        let _ = ShaderVisibility::All;
    }
}
