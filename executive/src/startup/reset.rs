//! Reset bookkeeping
//!
//! The reset-survivable area image: reset cause/counters, the system
//! log, the exception/reset log, and the performance data. The image is
//! loaded at boot, cleared on a power-on reset, preserved and re-stored
//! across processor resets.

use alloc::vec::Vec;

use kestrel_platform::{ResetSubtype, ResetType};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MAX_PROCESSOR_RESETS;
use crate::erlog::ErLog;
use crate::perf::PerfData;
use crate::syslog::SysLog;

/// Raw code for a reset type, as stored in log entries.
pub fn reset_type_code(kind: ResetType) -> u8 {
    match kind {
        ResetType::Processor => 1,
        ResetType::PowerOn => 2,
    }
}

/// Decode a commanded reset type. Exactly two values are recognized.
pub fn reset_type_from_code(code: u16) -> Option<ResetType> {
    match code {
        1 => Some(ResetType::Processor),
        2 => Some(ResetType::PowerOn),
        _ => None,
    }
}

/// Raw code for a reset subtype.
pub fn reset_subtype_code(subtype: ResetSubtype) -> u8 {
    match subtype {
        ResetSubtype::PowerCycle => 1,
        ResetSubtype::HardwareSpecialCommand => 2,
        ResetSubtype::Watchdog => 3,
        ResetSubtype::ResetCommand => 4,
        ResetSubtype::Other => 5,
    }
}

/// Reset counters and classification for the current boot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetVars {
    /// Raw code of the reset that produced this boot.
    pub reset_type: u8,
    /// Raw subtype code.
    pub reset_subtype: u8,
    /// Processor resets since the last power-on reset. Clamped to
    /// `max_processor_resets + 1`.
    pub processor_reset_count: u16,
    /// Budget before a processor-reset request escalates to power-on.
    pub max_processor_resets: u16,
    /// Boots survived by this image.
    pub boot_count: u32,
}

impl Default for ResetVars {
    fn default() -> Self {
        ResetVars {
            reset_type: 0,
            reset_subtype: 0,
            processor_reset_count: 0,
            max_processor_resets: DEFAULT_MAX_PROCESSOR_RESETS,
            boot_count: 0,
        }
    }
}

/// The full reset-survivable area.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetData {
    pub vars: ResetVars,
    pub syslog: SysLog,
    pub erlog: ErLog,
    pub perf: PerfData,
}

impl ResetData {
    /// Encode the image for `PlatformSupport::reset_area_store`.
    pub fn encode(&self) -> Vec<u8> {
        // A struct this size always encodes; an empty image is the
        // correct degenerate result if it somehow cannot.
        postcard::to_allocvec(self).unwrap_or_default()
    }

    /// Decode a stored image. `None` for empty or unreadable images.
    pub fn decode(image: &[u8]) -> Option<ResetData> {
        if image.is_empty() {
            return None;
        }
        postcard::from_bytes(image).ok()
    }
}
