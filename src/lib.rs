//! # vkshade
//!
//! The shader translation core of a Direct3D 12 compatibility layer: it
//! ingests DXBC containers carrying shader-model 5 ("TPF") bytecode and
//! root-signature blobs, and produces Vulkan-compatible artifacts — SPIR-V
//! modules and structured root-signature descriptions — plus a
//! content-addressed pipeline-state cache to persist the results of that
//! translation across runs.
//!
//! ## Layout
//!
//! - [`io`] — bounds-checked little-endian byte reader/writer.
//! - [`checksum`] — the DXBC container's custom MD5-variant checksum.
//! - [`dxbc`] — the chunked container codec built on top of it.
//! - [`signature`] — input/output/patch-constant signature chunks.
//! - [`root_signature`] — the versioned root-signature binary codec.
//! - [`spirv`] — an append-only SPIR-V module builder.
//! - [`compiler`] — the TPF-instruction-to-SPIR-V lowering pass.
//! - [`cache`] — the pipeline-state cache and its on-disk formats.
//! - [`api`] — the narrow public entry points composing all of the above.
//!
//! Out of scope (see spec's Non-goals): the Vulkan driver, the DXIL→SPIR-V
//! translator (detected and delegated to, never implemented here), TPF
//! instruction decoding itself (consumed as an externally-decoded stream,
//! see [`compiler::Instruction`]).
pub mod api;
pub mod cache;
mod checksum;
pub mod compiler;
pub mod dxbc;
pub mod error;
mod fnv;
pub mod io;
mod md5;
pub mod root_signature;
pub mod signature;
pub mod spirv;

pub use error::{Error, Result};
