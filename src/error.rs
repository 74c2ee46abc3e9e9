//! Error and result types shared by every component of the translation core.
use std::error;
use std::fmt;

/// The five error kinds the core ever reports. Parsing and serialisation
/// propagate these verbatim; nothing in this crate panics on malformed or
/// corrupt input.
#[derive(Debug)]
pub enum Error {
    /// Malformed binary input: wrong magic, truncated chunk, impossible
    /// offset, unknown version, heterogeneous descriptor table, and so on.
    InvalidArgument(String),
    /// Allocation failed during parse, serialise or compile.
    OutOfMemory,
    /// A persisted blob's vendor/device id disagrees with the current
    /// device.
    AdapterNotFound,
    /// A persisted blob's build tag, shader-interface key, UUID or
    /// checksum disagrees with what the running driver expects.
    DriverVersionMismatch(String),
    /// A shader body failed to parse; only raised by the DXIL delegation
    /// path.
    InvalidShader(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;
        match self {
            InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            OutOfMemory => write!(f, "out of memory"),
            AdapterNotFound => write!(f, "adapter not found"),
            DriverVersionMismatch(msg) => write!(f, "driver version mismatch: {}", msg),
            InvalidShader(msg) => write!(f, "invalid shader: {}", msg),
        }
    }
}
impl error::Error for Error {}

impl Error {
    pub(crate) fn invalid_argument<S: Into<String>>(msg: S) -> Error {
        Error::InvalidArgument(msg.into())
    }
    pub(crate) fn driver_mismatch<S: Into<String>>(msg: S) -> Error {
        Error::DriverVersionMismatch(msg.into())
    }
    pub(crate) fn invalid_shader<S: Into<String>>(msg: S) -> Error {
        Error::InvalidShader(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
