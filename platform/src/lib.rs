//! Kestrel Platform Abstraction Layer
//!
//! This crate defines the narrow interfaces through which the executive
//! core consumes its collaborators. The core never talks to an operating
//! system, a board support package, or a telemetry pipeline directly;
//! everything goes through these traits.
//!
//! # Modules
//!
//! - `os`: task/module/file primitives (`OsApi`)
//! - `psp`: reset causes, exception capture, non-volatile access
//!   (`PlatformSupport`)
//! - `events`: the operator-visible event sink (`EventSink`)
//! - `sync`: the best-effort shared-data lock
//! - `error`: shared error types

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod error;
pub mod events;
pub mod os;
pub mod psp;
pub mod sync;

// Re-exports for convenience
pub use error::{OsError, OsResult, PspError, PspResult};
pub use events::{EventId, EventSeverity, EventSink};
pub use os::{FileHandle, ModuleHandle, OpenFlags, OsApi, OsObject, SymbolAddr, TaskHandle, TaskSpec};
pub use psp::{ExceptionInfo, PlatformSupport, ResetSubtype, ResetType};
pub use sync::SharedLock;
