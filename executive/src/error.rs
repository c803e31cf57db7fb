//! Executive error types
//!
//! One taxonomy for the whole crate. Argument errors are rejected before
//! any state mutation; exhaustion errors are recoverable and distinct;
//! handle errors are fatal for the operation; collaborator failures carry
//! the underlying code unmodified.

use core::fmt;

use kestrel_mempool::PoolError;
use kestrel_perstore::CdsError;
use kestrel_platform::OsError;

/// Executive operation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// Argument rejected before any state change.
    BadArgument,
    /// No free slot in the addressed resource table.
    RegistryFull,
    /// Resource id is stale, out of range, or was never issued.
    NotFound,
    /// Command payload length does not match the expected length.
    LengthMismatch { expected: usize, actual: usize },
    /// A file-write job of this kind is already pending.
    AlreadyPending,
    /// Best-effort cleanup finished with this many failed sub-steps.
    CleanupFailed(u32),
    /// OS primitive failure.
    Os(OsError),
    /// Persistent store failure.
    Cds(CdsError),
    /// Memory pool failure.
    Pool(PoolError),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::BadArgument => write!(f, "bad argument"),
            ExecError::RegistryFull => write!(f, "resource table full"),
            ExecError::NotFound => write!(f, "resource not found"),
            ExecError::LengthMismatch { expected, actual } => {
                write!(f, "payload length {} (expected {})", actual, expected)
            }
            ExecError::AlreadyPending => write!(f, "dump already pending"),
            ExecError::CleanupFailed(n) => write!(f, "cleanup finished with {} failures", n),
            ExecError::Os(e) => write!(f, "OS failure: {}", e),
            ExecError::Cds(e) => write!(f, "persistent store failure: {}", e),
            ExecError::Pool(e) => write!(f, "pool failure: {}", e),
        }
    }
}

impl From<OsError> for ExecError {
    fn from(e: OsError) -> Self {
        ExecError::Os(e)
    }
}

impl From<CdsError> for ExecError {
    fn from(e: CdsError) -> Self {
        ExecError::Cds(e)
    }
}

impl From<PoolError> for ExecError {
    fn from(e: PoolError) -> Self {
        ExecError::Pool(e)
    }
}

/// Result type for executive operations.
pub type ExecResult<T> = core::result::Result<T, ExecError>;
