//! The pipeline-library entry key (spec.md §3 "Pipeline-library entry"):
//! either an application-supplied wide-character name or an internal
//! 64-bit content hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LibraryKey {
    Name(Vec<u16>),
    InternalHash(u64),
}

impl LibraryKey {
    pub fn from_str(name: &str) -> LibraryKey {
        LibraryKey::Name(name.encode_utf16().collect())
    }
}
