//! Platform error types

use core::fmt;

/// Error returned by an `OsApi` primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsError {
    /// Named object does not exist.
    NotFound,
    /// An argument was rejected by the OS.
    InvalidArgument,
    /// Name exceeds the OS name limit.
    NameTooLong,
    /// The OS has no free object slots of the requested kind.
    NoFreeIds,
    /// I/O failure on a file primitive.
    Io,
    /// The primitive is not provided on this platform.
    NotImplemented,
    /// Unspecified OS failure.
    Failed,
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsError::NotFound => write!(f, "object not found"),
            OsError::InvalidArgument => write!(f, "invalid argument"),
            OsError::NameTooLong => write!(f, "name too long"),
            OsError::NoFreeIds => write!(f, "no free object ids"),
            OsError::Io => write!(f, "I/O error"),
            OsError::NotImplemented => write!(f, "not implemented"),
            OsError::Failed => write!(f, "OS call failed"),
        }
    }
}

/// Error returned by a `PlatformSupport` primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PspError {
    /// Offset/length outside the addressed region.
    OutOfRange,
    /// The underlying device reported a failure.
    Io,
    /// The facility is absent on this board.
    Unavailable,
}

impl fmt::Display for PspError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PspError::OutOfRange => write!(f, "out of range"),
            PspError::Io => write!(f, "device I/O error"),
            PspError::Unavailable => write!(f, "facility unavailable"),
        }
    }
}

/// Result type for OS primitives.
pub type OsResult<T> = core::result::Result<T, OsError>;

/// Result type for platform-support primitives.
pub type PspResult<T> = core::result::Result<T, PspError>;
