//! Pipeline-state cache / library (C8): blob layout for individual
//! pipelines, de-duplicated internal stores, two on-disk persistence
//! formats, and the background worker that keeps the stream-archive
//! format up to date.
mod blob;
mod key;
mod library;
mod stream;
mod toc;
mod varint;
mod worker;

pub use blob::{
    Chunk, ChunkKind, ChunkTag, CompatRecord, PipelineBlobHeader, MAX_STAGES,
    parse_pipeline_blob, serialize_pipeline_blob, unwrap_internal_blob, wrap_internal_blob,
};
pub use key::LibraryKey;
pub use library::{dxbc_blob_hashes, state_desc_compat_hash, Entry, HotSlot, PipelineLibrary, StageContents};
pub use stream::{RecordType, StreamHeader, StreamRecord};
pub use toc::{parse_toc, serialize_toc, TocEntry, TocHeader};
pub use varint::{decode_words, encode_words, read_varint, write_varint};
pub use worker::{spawn, CachePaths, WorkerHandle, WorkerMessage};
