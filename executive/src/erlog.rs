//! Exception/reset log
//!
//! Fixed-capacity ring of reset and exception records in the
//! reset-survivable area. Each entry captures the reset bookkeeping at
//! the time of the event plus a short description and the platform's
//! exception context id.

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::config::{ERLOG_DESC_LEN, ERLOG_ENTRIES};

/// What kind of event produced the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErLogKind {
    /// A boot, with its classified reset cause.
    Boot,
    /// A commanded or escalated restart request.
    Restart,
    /// A captured hardware/software exception.
    Exception,
}

/// One exception/reset log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErLogEntry {
    pub kind: ErLogKind,
    /// Raw reset type code at the time of the entry.
    pub reset_type: u8,
    /// Raw reset subtype code.
    pub reset_subtype: u8,
    pub processor_reset_count: u16,
    pub description: String,
    /// Platform exception context id, zero when not applicable.
    pub context_id: u32,
    pub time_ms: u64,
}

/// The ring itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErLog {
    entries: Vec<ErLogEntry>,
    /// Index the next entry lands in.
    next: usize,
    /// Total entries ever written, including overwritten ones.
    written: u32,
}

impl ErLog {
    /// Append an entry, overwriting the oldest once the ring is full.
    pub fn write(&mut self, mut entry: ErLogEntry) {
        if entry.description.len() > ERLOG_DESC_LEN {
            let mut cut = ERLOG_DESC_LEN;
            while !entry.description.is_char_boundary(cut) {
                cut -= 1;
            }
            entry.description.truncate(cut);
        }
        if self.entries.len() < ERLOG_ENTRIES {
            self.entries.push(entry);
        } else {
            self.entries[self.next] = entry;
        }
        self.next = (self.next + 1) % ERLOG_ENTRIES;
        self.written += 1;
    }

    /// Entries ordered oldest first.
    pub fn snapshot(&self) -> Vec<ErLogEntry> {
        if self.entries.len() < ERLOG_ENTRIES {
            self.entries.clone()
        } else {
            let mut out = Vec::with_capacity(ERLOG_ENTRIES);
            for i in 0..ERLOG_ENTRIES {
                out.push(self.entries[(self.next + i) % ERLOG_ENTRIES].clone());
            }
            out
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next = 0;
        self.written = 0;
    }

    pub fn written(&self) -> u32 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: u32) -> ErLogEntry {
        ErLogEntry {
            kind: ErLogKind::Exception,
            reset_type: 1,
            reset_subtype: 0,
            processor_reset_count: 0,
            description: alloc::format!("entry {}", n),
            context_id: n,
            time_ms: n as u64,
        }
    }

    #[test]
    fn test_write_and_snapshot_order() {
        let mut log = ErLog::default();
        for n in 0..3 {
            log.write(entry(n));
        }
        let snap = log.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].context_id, 0);
        assert_eq!(snap[2].context_id, 2);
    }

    #[test]
    fn test_ring_wraparound_keeps_newest() {
        let mut log = ErLog::default();
        for n in 0..(ERLOG_ENTRIES as u32 + 5) {
            log.write(entry(n));
        }
        let snap = log.snapshot();
        assert_eq!(snap.len(), ERLOG_ENTRIES);
        // Oldest surviving entry is number 5.
        assert_eq!(snap[0].context_id, 5);
        assert_eq!(
            snap[ERLOG_ENTRIES - 1].context_id,
            ERLOG_ENTRIES as u32 + 4
        );
        assert_eq!(log.written(), ERLOG_ENTRIES as u32 + 5);
    }

    #[test]
    fn test_description_truncated() {
        let mut log = ErLog::default();
        let mut e = entry(0);
        e.description = "D".repeat(ERLOG_DESC_LEN * 2);
        log.write(e);
        assert_eq!(log.snapshot()[0].description.len(), ERLOG_DESC_LEN);
    }

    #[test]
    fn test_clear() {
        let mut log = ErLog::default();
        log.write(entry(1));
        log.clear();
        assert!(log.snapshot().is_empty());
        assert_eq!(log.written(), 0);
    }
}
