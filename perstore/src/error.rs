//! Persistent store error types

use core::fmt;

use kestrel_platform::PspError;

/// Critical data store operation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdsError {
    /// The non-volatile region is absent or below the minimum size.
    NotImplemented,
    /// Block name empty or longer than the platform maximum.
    InvalidName,
    /// Zero-length block requested, or payload length does not match the
    /// registered size.
    InvalidSize,
    /// No free registry slot remains.
    RegistryFull,
    /// No size class fits the request, or the pool is out of space.
    BlockSize,
    /// Named block does not exist.
    NotFound,
    /// The owning application is still registered and running.
    OwnerActive,
    /// Critical-table flag does not match the registered entry.
    WrongType,
    /// Handle failed descriptor validation: stale, wrong state, or
    /// corrupt check pattern.
    InvalidHandle,
    /// Stored payload does not match its recorded CRC.
    CrcMismatch,
    /// The region carries no valid begin/end signature.
    Unformatted,
    /// The region's recorded structure is internally inconsistent.
    Corrupt,
    /// Non-volatile I/O failure, surfaced unmodified.
    NvIo(PspError),
}

impl fmt::Display for CdsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CdsError::NotImplemented => write!(f, "persistent store not present"),
            CdsError::InvalidName => write!(f, "invalid block name"),
            CdsError::InvalidSize => write!(f, "invalid block size"),
            CdsError::RegistryFull => write!(f, "registry full"),
            CdsError::BlockSize => write!(f, "no suitable block size"),
            CdsError::NotFound => write!(f, "block not found"),
            CdsError::OwnerActive => write!(f, "owning application still active"),
            CdsError::WrongType => write!(f, "critical-table flag mismatch"),
            CdsError::InvalidHandle => write!(f, "invalid block handle"),
            CdsError::CrcMismatch => write!(f, "stored CRC mismatch"),
            CdsError::Unformatted => write!(f, "region not initialized"),
            CdsError::Corrupt => write!(f, "region structure corrupt"),
            CdsError::NvIo(e) => write!(f, "non-volatile I/O failure: {}", e),
        }
    }
}

/// Result type for store operations.
pub type CdsResult<T> = core::result::Result<T, CdsError>;
