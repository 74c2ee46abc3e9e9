//! Versioned root-signature codec (C5): parse, serialise, convert between
//! versions, and validate before serialisation.
mod convert;
mod parse;
mod serialize;
mod types;
mod validate;

pub use convert::convert_root_signature;
pub use parse::parse_root_signature;
pub use serialize::{serialize_root_signature, serialize_root_signature_raw};
pub use types::*;
pub use validate::validate_root_signature;
