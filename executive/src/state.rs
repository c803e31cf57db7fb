//! Executive global state
//!
//! The `Executive` owns every table and collaborates with the OS,
//! platform, and event sink through the narrow trait interfaces. The
//! resource/lifecycle tables sit behind one shared-data lock; the
//! reset-survivable area and the background-job state each have their
//! own; the persistent store locks internally.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use hashbrown::HashMap;
use kestrel_mempool::Pool;
use kestrel_perstore::CdsStore;
use kestrel_platform::{
    EventId, EventSeverity, EventSink, OsApi, PlatformSupport, ResetType, SharedLock,
};

use crate::apps::Tables;
use crate::erlog::{ErLogEntry, ErLogKind};
use crate::error::ExecResult;
use crate::events;
use crate::perf::PerfDumpJob;
use crate::startup::reset::{reset_type_code, ResetData};

/// Background-job bookkeeping: the resumable dump jobs.
#[derive(Default)]
pub struct BackgroundState {
    pub perf_dump: PerfDumpJob,
    /// Pending exception/reset-log dump target, if one is queued.
    pub erlog_dump: Option<String>,
}

/// Command acceptance counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandCounters {
    pub accepted: u32,
    pub rejected: u32,
}

/// The executive services core.
pub struct Executive {
    pub(crate) os: Arc<dyn OsApi>,
    pub(crate) psp: Arc<dyn PlatformSupport>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) tables: SharedLock<Tables>,
    pub(crate) reset: SharedLock<ResetData>,
    pub(crate) background: SharedLock<BackgroundState>,
    pub(crate) cds: CdsStore,
    /// Pools registered for statistics telemetry, by name.
    pub(crate) pools: SharedLock<HashMap<String, Arc<Pool>>>,
    pub(crate) cmd_counts: SharedLock<CommandCounters>,
}

impl Executive {
    /// Construct the executive and run the persistent store's early
    /// initialization. Reset classification happens in `main`.
    pub fn new(
        os: Arc<dyn OsApi>,
        psp: Arc<dyn PlatformSupport>,
        events: Arc<dyn EventSink>,
    ) -> ExecResult<Executive> {
        let cds = CdsStore::init(psp.clone())?;
        Ok(Executive {
            os,
            psp,
            events,
            tables: SharedLock::new("shared-data", Tables::new()),
            reset: SharedLock::new("reset-data", ResetData::default()),
            background: SharedLock::new("background", BackgroundState::default()),
            cds,
            pools: SharedLock::new("pool-registry", HashMap::new()),
            cmd_counts: SharedLock::new("command-counters", CommandCounters::default()),
        })
    }

    /// The persistent store.
    pub fn cds(&self) -> &CdsStore {
        &self.cds
    }

    /// Fire an event and mirror it to the log facade.
    pub(crate) fn emit(&self, id: EventId, severity: EventSeverity, text: &str) {
        match severity {
            EventSeverity::Debug => log::debug!("[exec] evt {}: {}", id, text),
            EventSeverity::Info => log::info!("[exec] evt {}: {}", id, text),
            EventSeverity::Error => log::error!("[exec] evt {}: {}", id, text),
            EventSeverity::Critical => log::error!("[exec] evt {} (critical): {}", id, text),
        }
        self.events.emit(id, severity, text);
    }

    /// Append a time-tagged line to the system log.
    pub fn write_syslog(&self, msg: &str) {
        let now = self.os.ticks_ms();
        self.reset.with(|r| r.syslog.write(now, msg));
    }

    /// Store the reset-survivable image. Failures are diagnostics; the
    /// caller's operation proceeds regardless.
    pub(crate) fn store_reset_area(&self) {
        let image = self.reset.with(|r| r.encode());
        if let Err(err) = self.psp.reset_area_store(&image) {
            log::warn!("[exec] reset area store failed: {}", err);
        }
    }

    /// Register a pool for statistics telemetry.
    pub fn register_pool(&self, name: &str, pool: Arc<Pool>) {
        self.pools.with(|p| {
            p.insert(String::from(name), pool);
        });
    }

    /// Statistics for a registered pool.
    pub fn pool_stats(&self, name: &str) -> Option<kestrel_mempool::PoolStats> {
        self.pools.with(|p| p.get(name).map(|pool| pool.stats()))
    }

    /// Application id registered under `name`.
    pub fn app_id_by_name(&self, name: &str) -> Option<crate::resource::ResourceId> {
        self.tables.with(|t| t.app_by_name(name))
    }

    /// Snapshot of one application.
    pub fn app_info(&self, id: crate::resource::ResourceId) -> Option<crate::apps::AppInfo> {
        self.tables.with(|t| t.app_info(id))
    }

    /// Snapshot of every application.
    pub fn all_apps(&self) -> Vec<crate::apps::AppInfo> {
        self.tables.with(|t| t.all_app_info())
    }

    /// Snapshot of every task.
    pub fn all_tasks(&self) -> Vec<crate::apps::TaskInfo> {
        self.tables.with(|t| t.all_task_info())
    }

    /// Copy of the reset bookkeeping.
    pub fn reset_vars(&self) -> crate::startup::reset::ResetVars {
        self.reset.with(|r| r.vars.clone())
    }

    /// Run `f` against the generic counter table.
    pub fn with_counters<R>(
        &self,
        f: impl FnOnce(
            &mut crate::resource::SlotTable<crate::resource::counters::CounterRecord>,
        ) -> R,
    ) -> R {
        self.tables.with(|t| f(&mut t.counters))
    }

    /// Request a node restart, applying the processor-reset budget.
    ///
    /// Once the surviving processor-reset count has reached the
    /// configured maximum, a processor-reset request is silently
    /// escalated to a power-on reset: the node's protection against a
    /// boot loop of repeated processor resets.
    pub fn escalate_restart(&self, requested: ResetType, reason: &str) {
        let actual = self.reset.with(|r| {
            let actual = if requested == ResetType::Processor
                && r.vars.processor_reset_count >= r.vars.max_processor_resets
            {
                ResetType::PowerOn
            } else {
                requested
            };
            r.erlog.write(ErLogEntry {
                kind: ErLogKind::Restart,
                reset_type: reset_type_code(actual),
                reset_subtype: 0,
                processor_reset_count: r.vars.processor_reset_count,
                description: String::from(reason),
                context_id: 0,
                time_ms: self.os.ticks_ms(),
            });
            actual
        });
        self.write_syslog(reason);
        self.emit(
            events::EVT_SYSTEM_RESTART,
            EventSeverity::Critical,
            &alloc::format!("{} reset: {}", actual.as_str(), reason),
        );
        self.store_reset_area();
        self.psp.restart(actual);
    }
}

// ── Tests ───────────────────────────────────────────────────
