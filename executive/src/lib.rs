//! Kestrel Executive Services
//!
//! The executive core of the flight-software kernel layer: application,
//! task, and library lifecycle; the resource registry; startup and reset
//! sequencing; reset-surviving logs; and the command surface. Memory
//! pooling lives in `kestrel-mempool`, the persistent store in
//! `kestrel-perstore`, and every OS/platform/event dependency is consumed
//! through the `kestrel-platform` traits.
//!
//! # Modules
//!
//! - `resource`: generation-stamped ids and the slot tables
//! - `apps`: lifecycle records, control-request processing, exceptions
//! - `startup`: manifest processing, boot classification, startup sync
//! - `background`: the cooperative background job list
//! - `syslog` / `erlog` / `perf`: the reset-surviving logs
//! - `command`: the (function code, payload) command surface
//! - `config`: compile-time platform limits

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod apps;
pub mod background;
pub mod command;
pub mod config;
pub mod erlog;
pub mod error;
pub mod events;
pub mod perf;
pub mod resource;
pub mod startup;
pub mod state;
pub mod syslog;

#[cfg(test)]
mod testutil;

// Re-exports for convenience
pub use apps::{
    AppInfo, AppState, AppType, ControlRequest, ExceptionAction, StartParams, TaskInfo,
};
pub use error::{ExecError, ExecResult};
pub use resource::{ResourceId, ResourceKind};
pub use state::{BackgroundState, CommandCounters, Executive};
