//! Background work
//!
//! One shared task round-robins a fixed job list once per tick: the
//! exception scan, the application-table scan, the performance-log dump,
//! and the exception/reset-log dump. Each job executes a bounded slice
//! and records its remaining progress in its own state, so no job can
//! starve the others.

use alloc::format;
use alloc::string::String;

use kestrel_platform::{EventSeverity, OpenFlags};

use crate::config::PERF_DUMP_DELAY_TICKS;
use crate::error::{ExecError, ExecResult};
use crate::events;
use crate::perf::{PerfDumpHeader, PerfDumpMeta, PerfDumpState, DUMP_BATCH};
use crate::state::Executive;

impl Executive {
    /// One scheduler pass over the fixed job list.
    pub fn run_background_tick(&self, elapsed_ms: u32) {
        self.scan_exceptions();
        self.scan_app_table(elapsed_ms);
        self.perf_dump_step();
        self.erlog_dump_step();
    }

    /// Queue a performance-log dump to `path`.
    ///
    /// Only one dump may be in flight; a second request is rejected with
    /// a distinct "already pending" condition.
    pub fn request_perf_dump(&self, path: &str) -> ExecResult<()> {
        self.background.with(|bg| {
            if !bg.perf_dump.is_idle() {
                return Err(ExecError::AlreadyPending);
            }
            bg.perf_dump.state = PerfDumpState::Init;
            bg.perf_dump.path = String::from(path);
            bg.perf_dump.file = None;
            bg.perf_dump.read_idx = 0;
            bg.perf_dump.total = 0;
            bg.perf_dump.written = 0;
            bg.perf_dump.delay = 0;
            Ok(())
        })
    }

    /// Queue an exception/reset-log dump to `path`.
    pub fn request_erlog_dump(&self, path: &str) -> ExecResult<()> {
        self.background.with(|bg| {
            if bg.erlog_dump.is_some() {
                return Err(ExecError::AlreadyPending);
            }
            bg.erlog_dump = Some(String::from(path));
            Ok(())
        })
    }

    /// Advance the performance dump by one bounded slice.
    pub(crate) fn perf_dump_step(&self) {
        let state = self.background.with(|bg| bg.perf_dump.state);
        match state {
            PerfDumpState::Idle => {}
            PerfDumpState::Init => {
                let path = self.background.with(|bg| bg.perf_dump.path.clone());
                match self.os.open(
                    &path,
                    OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                ) {
                    Ok(file) => {
                        let total = self.reset.with(|r| r.perf.entry_count());
                        self.background.with(|bg| {
                            bg.perf_dump.file = Some(file);
                            bg.perf_dump.total = total;
                            bg.perf_dump.state = PerfDumpState::WriteHeader;
                        });
                    }
                    Err(err) => {
                        self.emit(
                            events::EVT_PERF_DUMP_ERROR,
                            EventSeverity::Error,
                            &format!("perf dump: cannot create {}: {}", path, err),
                        );
                        self.background.with(|bg| {
                            bg.perf_dump.state = PerfDumpState::Idle;
                        });
                    }
                }
            }
            PerfDumpState::WriteHeader => {
                let (file, total) = self
                    .background
                    .with(|bg| (bg.perf_dump.file, bg.perf_dump.total));
                let header = PerfDumpHeader {
                    magic: *b"KPRF",
                    version: 1,
                    entry_count: total as u32,
                };
                self.dump_write(file, &header, PerfDumpState::WriteMetadata);
            }
            PerfDumpState::WriteMetadata => {
                let file = self.background.with(|bg| bg.perf_dump.file);
                let meta = self.reset.with(|r| PerfDumpMeta {
                    filter_mask: r.perf.filter_mask,
                    trigger_mask: r.perf.trigger_mask,
                    trigger_mode: r.perf.trigger_mode,
                    accepted: r.perf.accepted(),
                });
                self.dump_write(file, &meta, PerfDumpState::WriteEntries);
            }
            PerfDumpState::WriteEntries => {
                let (file, read_idx, total) = self.background.with(|bg| {
                    (bg.perf_dump.file, bg.perf_dump.read_idx, bg.perf_dump.total)
                });
                let end = core::cmp::min(read_idx + DUMP_BATCH, total);
                let batch: alloc::vec::Vec<crate::perf::PerfEntry> = self.reset.with(|r| {
                    (read_idx..end).filter_map(|i| r.perf.entry_at(i)).collect()
                });
                match postcard::to_allocvec(&batch) {
                    Ok(bytes) => {
                        if let Some(f) = file {
                            if let Err(err) = self.os.write(f, &bytes) {
                                self.fail_perf_dump(&format!("write failed: {}", err));
                                return;
                            }
                        }
                        self.background.with(|bg| {
                            bg.perf_dump.read_idx = end;
                            bg.perf_dump.written = end as u32;
                            if end >= bg.perf_dump.total {
                                // Entries done: close and cool off.
                                if let Some(f) = bg.perf_dump.file.take() {
                                    let _ = self.os.close(f);
                                }
                                bg.perf_dump.delay = PERF_DUMP_DELAY_TICKS;
                                bg.perf_dump.state = PerfDumpState::Delay;
                            }
                        });
                    }
                    Err(_) => self.fail_perf_dump("encode failed"),
                }
            }
            PerfDumpState::Delay => {
                let done = self.background.with(|bg| {
                    bg.perf_dump.delay = bg.perf_dump.delay.saturating_sub(1);
                    if bg.perf_dump.delay == 0 {
                        bg.perf_dump.state = PerfDumpState::Idle;
                        true
                    } else {
                        false
                    }
                });
                if done {
                    let (path, written) = self
                        .background
                        .with(|bg| (bg.perf_dump.path.clone(), bg.perf_dump.written));
                    self.emit(
                        events::EVT_PERF_DUMP_COMPLETE,
                        EventSeverity::Info,
                        &format!("perf dump complete: {} entries to {}", written, path),
                    );
                }
            }
        }
    }

    fn dump_write<T: serde::Serialize>(
        &self,
        file: Option<kestrel_platform::FileHandle>,
        record: &T,
        next: PerfDumpState,
    ) {
        match postcard::to_allocvec(record) {
            Ok(bytes) => {
                if let Some(f) = file {
                    if let Err(err) = self.os.write(f, &bytes) {
                        self.fail_perf_dump(&format!("write failed: {}", err));
                        return;
                    }
                }
                self.background.with(|bg| bg.perf_dump.state = next);
            }
            Err(_) => self.fail_perf_dump("encode failed"),
        }
    }

    fn fail_perf_dump(&self, reason: &str) {
        self.emit(
            events::EVT_PERF_DUMP_ERROR,
            EventSeverity::Error,
            &format!("perf dump: {}", reason),
        );
        self.background.with(|bg| {
            if let Some(f) = bg.perf_dump.file.take() {
                let _ = self.os.close(f);
            }
            bg.perf_dump.state = PerfDumpState::Idle;
        });
    }

    /// Write out the exception/reset log if a dump is pending. The ring
    /// is small, so this job completes in one slice.
    pub(crate) fn erlog_dump_step(&self) {
        let Some(path) = self.background.with(|bg| bg.erlog_dump.take()) else {
            return;
        };
        let entries = self.reset.with(|r| r.erlog.snapshot());
        let result = self
            .os
            .open(
                &path,
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            )
            .and_then(|file| {
                let outcome = postcard::to_allocvec(&entries)
                    .map_err(|_| kestrel_platform::OsError::Failed)
                    .and_then(|bytes| self.os.write(file, &bytes).map(|_| ()));
                let _ = self.os.close(file);
                outcome
            });
        match result {
            Ok(()) => self.emit(
                events::EVT_ERLOG_WRITTEN,
                EventSeverity::Info,
                &format!("exception/reset log written: {} entries to {}", entries.len(), path),
            ),
            Err(err) => self.emit(
                events::EVT_ERLOG_WRITE_ERROR,
                EventSeverity::Error,
                &format!("exception/reset log dump failed: {}", err),
            ),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecError;
    use crate::perf::{PerfDumpState, TriggerMode};
    use crate::testutil::harness;

    fn dump_state(h: &crate::testutil::Harness) -> PerfDumpState {
        h.exec.background.with(|bg| bg.perf_dump.state)
    }

    #[test]
    fn test_perf_dump_walks_states_and_writes_file() {
        let h = harness(0);
        h.exec.reset.with(|r| {
            r.perf.start(TriggerMode::Start);
            for n in 0..10 {
                r.perf.log_entry(1, n % 2 == 1, n);
            }
            r.perf.stop();
        });
        h.exec.request_perf_dump("/ram/perf.dat").unwrap();
        assert_eq!(dump_state(&h), PerfDumpState::Init);

        h.exec.perf_dump_step();
        assert_eq!(dump_state(&h), PerfDumpState::WriteHeader);
        h.exec.perf_dump_step();
        assert_eq!(dump_state(&h), PerfDumpState::WriteMetadata);
        h.exec.perf_dump_step();
        assert_eq!(dump_state(&h), PerfDumpState::WriteEntries);
        h.exec.perf_dump_step();
        assert_eq!(dump_state(&h), PerfDumpState::Delay);

        // Delay ticks, then idle with a completion event.
        for _ in 0..crate::config::PERF_DUMP_DELAY_TICKS {
            h.exec.perf_dump_step();
        }
        assert_eq!(dump_state(&h), PerfDumpState::Idle);
        assert!(h.events.has(events::EVT_PERF_DUMP_COMPLETE));
        assert!(!h.os.file_contents("/ram/perf.dat").unwrap().is_empty());
    }

    #[test]
    fn test_perf_dump_batches_large_rings() {
        let h = harness(0);
        let entries = (DUMP_BATCH * 2 + 5) as u64;
        h.exec.reset.with(|r| {
            r.perf.start(TriggerMode::Start);
            for n in 0..entries {
                r.perf.log_entry(2, false, n);
            }
        });
        h.exec.request_perf_dump("/ram/perf.dat").unwrap();
        h.exec.perf_dump_step(); // init
        h.exec.perf_dump_step(); // header
        h.exec.perf_dump_step(); // metadata

        // Three entry batches before the delay state.
        h.exec.perf_dump_step();
        assert_eq!(dump_state(&h), PerfDumpState::WriteEntries);
        h.exec.perf_dump_step();
        assert_eq!(dump_state(&h), PerfDumpState::WriteEntries);
        h.exec.perf_dump_step();
        assert_eq!(dump_state(&h), PerfDumpState::Delay);
        let written = h.exec.background.with(|bg| bg.perf_dump.written);
        assert_eq!(written as u64, entries);
    }

    #[test]
    fn test_perf_dump_second_request_rejected_while_pending() {
        let h = harness(0);
        h.exec.request_perf_dump("/ram/perf1.dat").unwrap();
        assert_eq!(
            h.exec.request_perf_dump("/ram/perf2.dat").err(),
            Some(ExecError::AlreadyPending)
        );
    }

    #[test]
    fn test_perf_dump_empty_ring_completes() {
        let h = harness(0);
        h.exec.request_perf_dump("/ram/perf.dat").unwrap();
        h.exec.perf_dump_step(); // init
        h.exec.perf_dump_step(); // header
        h.exec.perf_dump_step(); // metadata
        h.exec.perf_dump_step(); // entries (none)
        assert_eq!(dump_state(&h), PerfDumpState::Delay);
        for _ in 0..crate::config::PERF_DUMP_DELAY_TICKS {
            h.exec.perf_dump_step();
        }
        assert_eq!(dump_state(&h), PerfDumpState::Idle);
        assert!(h.events.has(events::EVT_PERF_DUMP_COMPLETE));
    }

    #[test]
    fn test_erlog_dump_pending_flag_discipline() {
        let h = harness(0);
        h.exec.classify_boot(); // guarantees at least one entry
        h.exec.request_erlog_dump("/ram/erlog.dat").unwrap();
        // A second request while one is pending is a distinct error.
        assert_eq!(
            h.exec.request_erlog_dump("/ram/erlog2.dat").err(),
            Some(ExecError::AlreadyPending)
        );

        h.exec.erlog_dump_step();
        assert!(h.events.has(events::EVT_ERLOG_WRITTEN));
        assert!(!h.os.file_contents("/ram/erlog.dat").unwrap().is_empty());

        // Once complete, a new request is accepted again.
        h.exec.request_erlog_dump("/ram/erlog3.dat").unwrap();
    }

    #[test]
    fn test_background_tick_runs_all_jobs() {
        let h = harness(0);
        h.exec.classify_boot();
        // No pending work anywhere: one tick must be a clean no-op.
        h.exec.run_background_tick(crate::config::APP_SCAN_PERIOD_MS);
        assert!(h.psp.restart_requests().is_empty());
    }
}
