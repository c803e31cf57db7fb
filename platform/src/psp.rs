//! Platform support interface
//!
//! Reset cause, restart requests, hardware/software exception capture, and
//! raw non-volatile memory access. The reset-survivable working area (reset
//! bookkeeping, logs, performance data) is exchanged as an opaque image;
//! the executive owns its encoding.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::PspResult;
use crate::os::TaskHandle;

/// The two escalating levels of node restart.
///
/// A processor reset preserves the non-volatile store and the reset area;
/// a power-on reset may clear both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetType {
    PowerOn,
    Processor,
}

impl ResetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetType::PowerOn => "POWER ON",
            ResetType::Processor => "PROCESSOR",
        }
    }
}

/// Sub-cause refinement of a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetSubtype {
    PowerCycle,
    HardwareSpecialCommand,
    Watchdog,
    ResetCommand,
    Other,
}

impl ResetSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetSubtype::PowerCycle => "POWER CYCLE",
            ResetSubtype::HardwareSpecialCommand => "HW SPECIAL COMMAND",
            ResetSubtype::Watchdog => "WATCHDOG",
            ResetSubtype::ResetCommand => "RESET COMMAND",
            ResetSubtype::Other => "OTHER",
        }
    }
}

/// One captured hardware/software exception, as reported by the platform.
#[derive(Debug, Clone)]
pub struct ExceptionInfo {
    /// Platform-assigned context identifier.
    pub context_id: u32,
    /// OS task that raised the exception, when attributable.
    pub task: Option<TaskHandle>,
    /// Platform-formatted description for the log entry.
    pub description: String,
}

/// The board/platform primitives consumed by the executive core.
pub trait PlatformSupport {
    /// Hardware-reported cause of the current boot.
    fn reset_cause(&self) -> (ResetType, ResetSubtype);

    /// Request a node restart. On real hardware this does not return;
    /// test doubles record the request instead.
    fn restart(&self, kind: ResetType);

    /// Halt with a panic code. Reserved for unrecoverable startup faults.
    fn panic(&self, code: u32);

    /// Number of exceptions captured since the last drain.
    fn exception_count(&self) -> u32;

    /// Take the oldest pending exception summary, if one is available.
    fn take_exception(&self) -> Option<ExceptionInfo>;

    /// Size in bytes of the non-volatile (critical store) region.
    fn nonvolatile_size(&self) -> usize;

    /// Read from the non-volatile region.
    fn nonvolatile_read(&self, offset: usize, buf: &mut [u8]) -> PspResult<()>;

    /// Write to the non-volatile region.
    fn nonvolatile_write(&self, offset: usize, data: &[u8]) -> PspResult<()>;

    /// Load the reset-survivable area image. Empty on first power-up.
    fn reset_area_load(&self) -> PspResult<Vec<u8>>;

    /// Store the reset-survivable area image.
    fn reset_area_store(&self, image: &[u8]) -> PspResult<()>;
}
