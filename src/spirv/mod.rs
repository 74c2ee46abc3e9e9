//! The SPIR-V module builder (C6): an append-only word-stream constructor
//! with interned types, a capability set, and an entry-point interface
//! list. Consumed by the TPF→SPIR-V compiler (C7).
mod builder;
mod types;
mod word;

pub use builder::Builder;
pub use types::ComponentType;
pub use word::{pack_string, WordStream};
