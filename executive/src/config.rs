//! Executive configuration constants.
//!
//! Compile-time platform limits. Values here size the resource tables,
//! the reset-survivable logs, and the lifecycle timing.

/// Maximum number of applications (core + external).
pub const MAX_APPLICATIONS: usize = 32;

/// Maximum number of loaded libraries.
pub const MAX_LIBRARIES: usize = 16;

/// Maximum number of tasks (main + child, all applications).
pub const MAX_TASKS: usize = 64;

/// Maximum number of generic counters.
pub const MAX_GEN_COUNTERS: usize = 8;

/// Maximum application name length in bytes.
pub const MAX_APP_NAME_LEN: usize = 20;

/// Maximum module path length in bytes.
pub const MAX_PATH_LEN: usize = 64;

/// Maximum entry-symbol length in bytes.
pub const MAX_SYM_LEN: usize = 32;

/// Maximum length of one startup-manifest entry, in bytes.
pub const MAX_MANIFEST_LINE: usize = 128;

/// Grace period granted to an application asked to stop, in ms.
pub const APP_KILL_TIMEOUT_MS: u32 = 5_000;

/// Period of the application-table scan, in ms.
pub const APP_SCAN_PERIOD_MS: u32 = 1_000;

/// Startup-sync wait budget before the system is declared partially
/// started, in ms.
pub const STARTUP_SYNC_TIMEOUT_MS: u32 = 15_000;

/// Poll period while waiting for startup sync, in ms.
pub const STARTUP_SYNC_POLL_MS: u32 = 100;

/// Default processor-reset budget before escalation to power-on.
pub const DEFAULT_MAX_PROCESSOR_RESETS: u16 = 2;

/// System log buffer size in bytes.
pub const SYSLOG_SIZE: usize = 3072;

/// Exception/reset log capacity, in entries.
pub const ERLOG_ENTRIES: usize = 20;

/// Maximum exception/reset log description length, in bytes.
pub const ERLOG_DESC_LEN: usize = 80;

/// Performance log ring capacity, in entries.
pub const PERF_BUFFER_ENTRIES: usize = 1024;

/// 32-bit words in the performance filter/trigger masks (128 marker ids).
pub const PERF_MASK_WORDS: usize = 4;

/// Performance-dump entries written per background tick.
pub const PERF_ENTRIES_PER_TICK: usize = 64;

/// Ticks the performance dump idles in its delay state after writing.
pub const PERF_DUMP_DELAY_TICKS: u32 = 2;
