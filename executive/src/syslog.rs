//! System log
//!
//! Fixed-size, time-tagged message buffer living in the reset-survivable
//! area, so the record of what happened before a processor reset is
//! available after it. When the buffer fills, behavior is mode
//! dependent: `Overwrite` wraps to the beginning, `Discard` drops the
//! message and counts it.

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::config::SYSLOG_SIZE;

/// Full-buffer behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SysLogMode {
    #[default]
    Overwrite,
    Discard,
}

impl SysLogMode {
    /// Decode the command field. Exactly two values are recognized.
    pub fn from_raw(raw: u32) -> Option<SysLogMode> {
        match raw {
            0 => Some(SysLogMode::Overwrite),
            1 => Some(SysLogMode::Discard),
            _ => None,
        }
    }
}

/// The system log buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysLog {
    buf: Vec<u8>,
    /// Next write offset.
    write_idx: usize,
    /// High-water mark of valid bytes.
    high: usize,
    mode: SysLogMode,
    /// Messages accepted.
    entries_written: u32,
    /// Messages dropped in `Discard` mode.
    discarded: u32,
}

impl Default for SysLog {
    fn default() -> Self {
        SysLog {
            buf: alloc::vec![0u8; SYSLOG_SIZE],
            write_idx: 0,
            high: 0,
            mode: SysLogMode::Overwrite,
            entries_written: 0,
            discarded: 0,
        }
    }
}

impl SysLog {
    /// Append one time-tagged line.
    ///
    /// A message that cannot fit in the remaining space either wraps the
    /// write position to the start (`Overwrite`) or is dropped and
    /// counted (`Discard`). Messages longer than the whole buffer are
    /// truncated.
    pub fn write(&mut self, time_ms: u64, msg: &str) {
        let mut line = alloc::format!("{:010}.{:03} {}\n", time_ms / 1000, time_ms % 1000, msg);
        if line.len() > self.buf.len() {
            let mut cut = self.buf.len();
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            line.truncate(cut);
        }
        if self.write_idx + line.len() > self.buf.len() {
            match self.mode {
                SysLogMode::Overwrite => {
                    self.write_idx = 0;
                }
                SysLogMode::Discard => {
                    self.discarded += 1;
                    return;
                }
            }
        }
        self.buf[self.write_idx..self.write_idx + line.len()].copy_from_slice(line.as_bytes());
        self.write_idx += line.len();
        self.high = core::cmp::max(self.high, self.write_idx);
        self.entries_written += 1;
    }

    /// Clear the buffer and counters. The mode is preserved.
    pub fn clear(&mut self) {
        self.buf.iter_mut().for_each(|b| *b = 0);
        self.write_idx = 0;
        self.high = 0;
        self.entries_written = 0;
        self.discarded = 0;
    }

    /// Change the full-buffer mode.
    pub fn set_mode(&mut self, mode: SysLogMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> SysLogMode {
        self.mode
    }

    /// Valid log contents, for the dump command.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf[..self.high]).into_owned()
    }

    pub fn entries_written(&self) -> u32 {
        self.entries_written
    }

    pub fn discarded(&self) -> u32 {
        self.discarded
    }
}
