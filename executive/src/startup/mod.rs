//! Startup/reset orchestration
//!
//! Boot classification, manifest-driven object creation, the startup
//! sync wait, and library loading. The orchestrator populates the
//! resource registry through the lifecycle layer and feeds reset
//! bookkeeping into the reset-survivable area.

pub mod manifest;
pub mod reset;

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use kestrel_platform::{EventSeverity, OpenFlags, ResetType};

use crate::apps::{AppState, AppType};
use crate::config::{
    MAX_APP_NAME_LEN, MAX_PATH_LEN, MAX_SYM_LEN, STARTUP_SYNC_POLL_MS, STARTUP_SYNC_TIMEOUT_MS,
};
use crate::erlog::{ErLogEntry, ErLogKind};
use crate::error::{ExecError, ExecResult};
use crate::events;
use crate::resource::ResourceId;
use crate::state::Executive;

use manifest::ManifestEntry;
use reset::{reset_subtype_code, reset_type_code, ResetData};

impl Executive {
    /// Full startup: classify the boot, process the startup manifest,
    /// wait for the applications to come up, and declare the system
    /// operational.
    ///
    /// An unreadable manifest file aborts startup; everything else is a
    /// per-entry or degraded-mode condition that startup survives.
    pub fn main(&self, manifest_path: &str) -> ExecResult<()> {
        self.classify_boot();
        self.process_manifest(manifest_path)?;
        self.wait_for_apps_started();
        self.emit(
            events::EVT_SYSTEM_OPERATIONAL,
            EventSeverity::Info,
            "executive startup complete",
        );
        self.write_syslog("executive startup complete");
        self.store_reset_area();
        Ok(())
    }

    /// Classify the boot cause and roll the reset bookkeeping forward.
    ///
    /// A power-on reset starts from a cleared area; a processor reset
    /// preserves the previous image and increments the processor-reset
    /// counter, clamped to one past the configured budget.
    pub fn classify_boot(&self) {
        let (rtype, rsubtype) = self.psp.reset_cause();
        let previous = match self.psp.reset_area_load() {
            Ok(image) => ResetData::decode(&image),
            Err(err) => {
                log::warn!("[exec] reset area unreadable: {}", err);
                None
            }
        };

        let now = self.os.ticks_ms();
        self.reset.with(|r| {
            *r = match (rtype, previous) {
                (ResetType::Processor, Some(prev)) => prev,
                // Power-on clears the area; a missing image starts fresh
                // in any case.
                _ => ResetData::default(),
            };
            r.vars.reset_type = reset_type_code(rtype);
            r.vars.reset_subtype = reset_subtype_code(rsubtype);
            r.vars.boot_count = r.vars.boot_count.wrapping_add(1);
            match rtype {
                ResetType::Processor => {
                    let cap = r.vars.max_processor_resets.saturating_add(1);
                    r.vars.processor_reset_count =
                        core::cmp::min(r.vars.processor_reset_count.saturating_add(1), cap);
                }
                ResetType::PowerOn => r.vars.processor_reset_count = 0,
            }
            r.erlog.write(ErLogEntry {
                kind: ErLogKind::Boot,
                reset_type: r.vars.reset_type,
                reset_subtype: r.vars.reset_subtype,
                processor_reset_count: r.vars.processor_reset_count,
                description: format!(
                    "{} reset ({})",
                    rtype.as_str(),
                    rsubtype.as_str()
                ),
                context_id: 0,
                time_ms: now,
            });
        });
        self.write_syslog(&format!(
            "boot: {} reset, subtype {}",
            rtype.as_str(),
            rsubtype.as_str()
        ));
        self.store_reset_area();
    }

    /// Read and execute the startup manifest.
    ///
    /// Per-entry failures are logged and skipped; a file that cannot be
    /// opened at all aborts startup entirely.
    pub fn process_manifest(&self, path: &str) -> ExecResult<()> {
        let file = match self.os.open(path, OpenFlags::READ) {
            Ok(f) => f,
            Err(err) => {
                log::error!("[exec] cannot open startup manifest '{}': {}", path, err);
                return Err(err.into());
            }
        };
        let mut text = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            match self.os.read(file, &mut buf) {
                Ok(0) => break,
                Ok(n) => text.extend_from_slice(&buf[..n]),
                // A mid-file read failure ends the manifest early; the
                // entries already read still run.
                Err(err) => {
                    log::warn!("[exec] manifest read failed: {}", err);
                    break;
                }
            }
        }
        let _ = self.os.close(file);

        for entry in manifest::parse(&text) {
            match entry {
                Ok(ManifestEntry::App(params)) => {
                    let name = params.name.clone();
                    match self.start_app(params, AppType::External) {
                        Ok(id) => self.emit(
                            events::EVT_APP_STARTED,
                            EventSeverity::Info,
                            &format!("app {} created ({})", name, id),
                        ),
                        Err(err) => self.emit(
                            events::EVT_APP_START_ERROR,
                            EventSeverity::Error,
                            &format!("app {} create failed: {}", name, err),
                        ),
                    }
                }
                Ok(ManifestEntry::Lib {
                    name,
                    path,
                    entry_symbol,
                }) => match self.load_library(&name, &path, &entry_symbol) {
                    Ok(id) => self.emit(
                        events::EVT_LIB_LOADED,
                        EventSeverity::Info,
                        &format!("library {} loaded ({})", name, id),
                    ),
                    Err(err) => self.emit(
                        events::EVT_LIB_LOAD_ERROR,
                        EventSeverity::Error,
                        &format!("library {} load failed: {}", name, err),
                    ),
                },
                Ok(ManifestEntry::Disabled) => {
                    log::debug!("[exec] skipping disabled manifest entry");
                }
                Err(err) => self.emit(
                    events::EVT_MANIFEST_LINE_ERROR,
                    EventSeverity::Error,
                    &format!("manifest entry skipped: {}", err),
                ),
            }
        }
        Ok(())
    }

    /// Load and initialize a library.
    pub fn load_library(&self, name: &str, path: &str, entry_symbol: &str) -> ExecResult<ResourceId> {
        if name.is_empty()
            || name.len() > MAX_APP_NAME_LEN
            || path.is_empty()
            || path.len() > MAX_PATH_LEN
            || entry_symbol.len() > MAX_SYM_LEN
        {
            return Err(ExecError::BadArgument);
        }
        let module = self.os.load_module(path)?;
        let entry = match self.os.lookup_symbol(module, entry_symbol) {
            Ok(e) => e,
            Err(err) => {
                let _ = self.os.unload_module(module);
                return Err(err.into());
            }
        };
        if let Err(err) = self.os.run_entry(entry) {
            let _ = self.os.unload_module(module);
            return Err(err.into());
        }

        let result = self.tables.with(|t| {
            let id = t.libs.reserve()?;
            let lib = t.libs.locate_mut(id).ok_or(ExecError::NotFound)?;
            lib.name = String::from(name);
            lib.module = Some(module);
            Ok(id)
        });
        if result.is_err() {
            let _ = self.os.unload_module(module);
        }
        result
    }

    /// Wait (bounded) for every application to reach `Running`.
    ///
    /// On timeout the system is declared partially started: logged and
    /// reported, never fatal.
    pub fn wait_for_apps_started(&self) -> bool {
        let mut waited_ms = 0u32;
        loop {
            let pending: Vec<String> = self.tables.with(|t| {
                t.apps
                    .iter_used()
                    .filter(|(_, app)| app.state != AppState::Running)
                    .map(|(_, app)| app.start.name.clone())
                    .collect()
            });
            if pending.is_empty() {
                return true;
            }
            if waited_ms >= STARTUP_SYNC_TIMEOUT_MS {
                self.emit(
                    events::EVT_STARTUP_SYNC_TIMEOUT,
                    EventSeverity::Error,
                    &format!(
                        "startup sync timeout, {} app(s) not running: {}",
                        pending.len(),
                        pending.join(", ")
                    ),
                );
                self.write_syslog("system proceeding in partially started condition");
                return false;
            }
            self.os.delay_ms(STARTUP_SYNC_POLL_MS);
            waited_ms += STARTUP_SYNC_POLL_MS;
        }
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::apps::AppState;
    use crate::config::MAX_MANIFEST_LINE;
    use crate::events;
    use crate::testutil::{harness, FakeEvents, FakeOs, FakePsp};
    use crate::state::Executive;
    use kestrel_platform::{ResetSubtype, ResetType};

    const MANIFEST: &[u8] = b"LIB, /ld/sys_lib.so, sys_lib_init, SYS_LIB, 0, 0, 0x0, 1; \
APP, /ld/comm.so, comm_main, COMM, 70, 4096, 0x0, 1; \
APP, /ld/sched.so, sched_main, SCHED, 120, 8192, 0x0, 1; !";

    #[test]
    fn test_manifest_creates_apps_and_libraries() {
        let h = harness(0);
        h.os.put_file("/boot/startup.scr", MANIFEST);
        h.exec.process_manifest("/boot/startup.scr").unwrap();

        assert_eq!(h.exec.all_apps().len(), 2);
        assert!(h.exec.app_id_by_name("COMM").is_some());
        assert!(h.exec.app_id_by_name("SCHED").is_some());
        assert!(h.events.has(events::EVT_LIB_LOADED));
        // 2 app modules + 1 library module.
        assert_eq!(h.os.module_count(), 3);
    }

    #[test]
    fn test_manifest_long_line_skipped_rest_processed() {
        let h = harness(0);
        let mut text = alloc::vec::Vec::new();
        text.extend_from_slice(b"APP, /ld/a.so, a_main, AAA");
        text.extend_from_slice(&[b'A'; MAX_MANIFEST_LINE]);
        text.extend_from_slice(b"; APP, /ld/comm.so, comm_main, COMM, 70, 4096, 0x0, 1; !");
        h.os.put_file("/boot/startup.scr", &text);

        h.exec.process_manifest("/boot/startup.scr").unwrap();

        assert!(h.events.has(events::EVT_MANIFEST_LINE_ERROR));
        assert!(h.exec.app_id_by_name("COMM").is_some());
        assert_eq!(h.exec.all_apps().len(), 1);
    }

    #[test]
    fn test_manifest_unreadable_file_aborts_startup() {
        let h = harness(0);
        assert!(h.exec.process_manifest("/boot/missing.scr").is_err());
        assert!(h.exec.main("/boot/missing.scr").is_err());
    }

    #[test]
    fn test_app_create_failure_is_per_entry() {
        let h = harness(0);
        h.os.inner
            .lock()
            .fail_load
            .insert(alloc::string::String::from("/ld/comm.so"));
        h.os.put_file("/boot/startup.scr", MANIFEST);
        h.exec.process_manifest("/boot/startup.scr").unwrap();

        assert!(h.events.has(events::EVT_APP_START_ERROR));
        // The failed app is skipped; the later one still starts.
        assert!(h.exec.app_id_by_name("COMM").is_none());
        assert!(h.exec.app_id_by_name("SCHED").is_some());
    }

    #[test]
    fn test_startup_sync_completes_when_apps_run() {
        let h = harness(0);
        h.os.put_file("/boot/startup.scr", MANIFEST);
        h.exec.process_manifest("/boot/startup.scr").unwrap();
        for info in h.exec.all_apps() {
            h.exec.mark_app_running(info.id).unwrap();
        }
        assert!(h.exec.wait_for_apps_started());
        assert!(!h.events.has(events::EVT_STARTUP_SYNC_TIMEOUT));
    }

    #[test]
    fn test_startup_sync_timeout_degrades_but_proceeds() {
        let h = harness(0);
        h.os.put_file("/boot/startup.scr", MANIFEST);
        // Nothing ever reports running: main still completes.
        h.exec.main("/boot/startup.scr").unwrap();
        assert!(h.events.has(events::EVT_STARTUP_SYNC_TIMEOUT));
        assert!(h.events.has(events::EVT_SYSTEM_OPERATIONAL));
        let texts = h.events.texts(events::EVT_STARTUP_SYNC_TIMEOUT);
        assert!(texts[0].contains("COMM"));
    }

    #[test]
    fn test_power_on_boot_clears_reset_bookkeeping() {
        let h = harness(0);
        h.exec.classify_boot();
        let vars = h.exec.reset_vars();
        assert_eq!(vars.processor_reset_count, 0);
        assert_eq!(vars.boot_count, 1);
    }

    #[test]
    fn test_processor_boot_preserves_and_counts() {
        let os = FakeOs::new();
        let psp = FakePsp::new(0);
        let events_sink = FakeEvents::new();

        let first = Executive::new(os.clone(), psp.clone(), events_sink.clone()).unwrap();
        first.classify_boot();
        assert_eq!(first.reset_vars().boot_count, 1);

        // Processor reset: a fresh executive over the same platform
        // picks the image up and rolls it forward.
        psp.set_cause(ResetType::Processor, ResetSubtype::Watchdog);
        let second = Executive::new(os.clone(), psp.clone(), events_sink.clone()).unwrap();
        second.classify_boot();
        let vars = second.reset_vars();
        assert_eq!(vars.boot_count, 2);
        assert_eq!(vars.processor_reset_count, 1);
    }

    #[test]
    fn test_processor_reset_budget_escalates_to_power_on() {
        let os = FakeOs::new();
        let psp = FakePsp::new(0);
        let events_sink = FakeEvents::new();
        psp.set_cause(ResetType::Processor, ResetSubtype::Other);

        // Boot up to the budget (default max is 2).
        let mut boots = 0;
        let exec = loop {
            let exec = Executive::new(os.clone(), psp.clone(), events_sink.clone()).unwrap();
            exec.classify_boot();
            boots += 1;
            if boots == exec.reset_vars().max_processor_resets as u32 {
                break exec;
            }
        };
        assert_eq!(
            exec.reset_vars().processor_reset_count,
            exec.reset_vars().max_processor_resets
        );

        // The next processor-reset request converts silently.
        exec.escalate_restart(ResetType::Processor, "budget test");
        assert_eq!(psp.restart_requests(), alloc::vec![ResetType::PowerOn]);
    }

    #[test]
    fn test_processor_reset_counter_clamped() {
        let os = FakeOs::new();
        let psp = FakePsp::new(0);
        let events_sink = FakeEvents::new();
        psp.set_cause(ResetType::Processor, ResetSubtype::Other);

        let mut last = 0;
        for _ in 0..6 {
            let exec = Executive::new(os.clone(), psp.clone(), events_sink.clone()).unwrap();
            exec.classify_boot();
            last = exec.reset_vars().processor_reset_count;
        }
        // Never exceeds max + 1.
        let max = crate::config::DEFAULT_MAX_PROCESSOR_RESETS;
        assert_eq!(last, max + 1);
    }

    #[test]
    fn test_under_budget_processor_request_stays_processor() {
        let h = harness(0);
        h.exec.classify_boot(); // power-on, count 0
        h.exec.escalate_restart(ResetType::Processor, "ordinary restart");
        assert_eq!(h.psp.restart_requests(), alloc::vec![ResetType::Processor]);
    }

    #[test]
    fn test_library_failures_roll_back() {
        let h = harness(0);
        h.os.inner
            .lock()
            .missing_symbols
            .insert(alloc::string::String::from("sys_lib_init"));
        assert!(h
            .exec
            .load_library("SYS_LIB", "/ld/sys_lib.so", "sys_lib_init")
            .is_err());
        assert_eq!(h.os.module_count(), 0);
    }

    #[test]
    fn test_disabled_manifest_entry_skipped() {
        let h = harness(0);
        h.os.put_file(
            "/boot/startup.scr",
            b"APP, /ld/comm.so, comm_main, COMM, 70, 4096, 0x0, 0; !",
        );
        h.exec.process_manifest("/boot/startup.scr").unwrap();
        assert!(h.exec.all_apps().is_empty());
        assert!(!h.events.has(events::EVT_MANIFEST_LINE_ERROR));
    }

    #[test]
    fn test_apps_created_in_early_init() {
        let h = harness(0);
        h.os.put_file("/boot/startup.scr", MANIFEST);
        h.exec.process_manifest("/boot/startup.scr").unwrap();
        for info in h.exec.all_apps() {
            assert_eq!(info.state, AppState::EarlyInit);
        }
    }
}
