//! Command surface
//!
//! Discrete operations dispatched from a (function code, payload) pair.
//! Every code has exactly one expected payload length, checked before
//! any decoding; a mismatch is rejected uniformly with a length-error
//! event and the command is not executed. Payload fields are fixed-width
//! little-endian, with NUL-padded fixed-length strings.

use alloc::format;
use alloc::string::String;

use kestrel_platform::{EventSeverity, OpenFlags};
use serde::Serialize;

use crate::apps::{AppType, ControlRequest, ExceptionAction, StartParams};
use crate::error::{ExecError, ExecResult};
use crate::events;
use crate::perf::TriggerMode;
use crate::startup::reset::reset_type_from_code;
use crate::state::Executive;
use crate::syslog::SysLogMode;

/// Command function codes.
pub mod codes {
    pub const NOOP: u8 = 0;
    pub const RESET_COUNTERS: u8 = 1;
    pub const RESTART: u8 = 2;
    pub const START_APP: u8 = 4;
    pub const STOP_APP: u8 = 5;
    pub const RESTART_APP: u8 = 6;
    pub const RELOAD_APP: u8 = 7;
    pub const QUERY_ONE: u8 = 8;
    pub const QUERY_ALL: u8 = 9;
    pub const QUERY_ALL_TASKS: u8 = 10;
    pub const CLEAR_SYSLOG: u8 = 11;
    pub const WRITE_SYSLOG: u8 = 12;
    pub const OVERWRITE_SYSLOG: u8 = 13;
    pub const CLEAR_ERLOG: u8 = 14;
    pub const WRITE_ERLOG: u8 = 15;
    pub const START_PERF: u8 = 16;
    pub const STOP_PERF: u8 = 17;
    pub const SET_PERF_FILTER: u8 = 18;
    pub const SET_PERF_TRIGGER: u8 = 19;
    pub const RESET_PR_COUNT: u8 = 20;
    pub const SET_MAX_PR_COUNT: u8 = 21;
    pub const DELETE_CDS: u8 = 22;
    pub const DUMP_CDS_REGISTRY: u8 = 23;
    pub const SEND_POOL_STATS: u8 = 24;
}

/// Fixed field widths.
const NAME_LEN: usize = 20;
const PATH_LEN: usize = 64;
const SYM_LEN: usize = 32;
const CDS_NAME_LEN: usize = 32;

/// Expected payload length per function code.
fn expected_len(code: u8) -> Option<usize> {
    Some(match code {
        codes::NOOP | codes::RESET_COUNTERS | codes::CLEAR_SYSLOG | codes::CLEAR_ERLOG
        | codes::RESET_PR_COUNT => 0,
        codes::RESTART => 2,
        codes::START_APP => NAME_LEN + PATH_LEN + SYM_LEN + 1 + 1 + 2 + 4,
        codes::STOP_APP | codes::RESTART_APP | codes::QUERY_ONE | codes::SEND_POOL_STATS => {
            NAME_LEN
        }
        codes::RELOAD_APP => NAME_LEN + PATH_LEN,
        codes::QUERY_ALL | codes::QUERY_ALL_TASKS | codes::WRITE_SYSLOG | codes::WRITE_ERLOG
        | codes::STOP_PERF | codes::DUMP_CDS_REGISTRY => PATH_LEN,
        codes::OVERWRITE_SYSLOG | codes::START_PERF => 4,
        codes::SET_PERF_FILTER | codes::SET_PERF_TRIGGER => 8,
        codes::SET_MAX_PR_COUNT => 2,
        codes::DELETE_CDS => CDS_NAME_LEN + 1 + 3,
        _ => return None,
    })
}

/// Decode a NUL-padded fixed-width string field.
fn fixed_str(buf: &[u8]) -> ExecResult<&str> {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    core::str::from_utf8(&buf[..end]).map_err(|_| ExecError::BadArgument)
}

fn u16_at(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

fn u32_at(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// File record for the all-apps query.
#[derive(Serialize)]
struct QueryAppRecord {
    id: u32,
    name: String,
    app_type: u8,
    state: String,
    file_path: String,
    priority: u8,
    stack_size: u32,
    child_tasks: u32,
}

/// File record for the all-tasks query.
#[derive(Serialize)]
struct QueryTaskRecord {
    id: u32,
    app_id: u32,
    name: String,
}

impl Executive {
    /// Validate and execute one command.
    ///
    /// The accepted/rejected counters update according to the outcome.
    pub fn dispatch_command(&self, code: u8, payload: &[u8]) -> ExecResult<()> {
        let result = self.dispatch_inner(code, payload);
        self.cmd_counts.with(|c| match result {
            Ok(()) => c.accepted += 1,
            Err(_) => c.rejected += 1,
        });
        result
    }

    /// Accepted and rejected command counts.
    pub fn command_counters(&self) -> (u32, u32) {
        self.cmd_counts.with(|c| (c.accepted, c.rejected))
    }

    fn dispatch_inner(&self, code: u8, payload: &[u8]) -> ExecResult<()> {
        let Some(expected) = expected_len(code) else {
            self.emit(
                events::EVT_COMMAND_ERROR,
                EventSeverity::Error,
                &format!("unknown command code {}", code),
            );
            return Err(ExecError::BadArgument);
        };
        if payload.len() != expected {
            self.emit(
                events::EVT_COMMAND_LENGTH_ERROR,
                EventSeverity::Error,
                &format!(
                    "command {}: payload length {} (expected {})",
                    code,
                    payload.len(),
                    expected
                ),
            );
            return Err(ExecError::LengthMismatch {
                expected,
                actual: payload.len(),
            });
        }

        match code {
            codes::NOOP => {
                self.emit(events::EVT_NOOP, EventSeverity::Info, "executive no-op");
                Ok(())
            }
            codes::RESET_COUNTERS => {
                self.cmd_counts.with(|c| {
                    c.accepted = 0;
                    c.rejected = 0;
                });
                self.emit(
                    events::EVT_RESET_COUNTERS,
                    EventSeverity::Info,
                    "command counters reset",
                );
                Ok(())
            }
            codes::RESTART => {
                let Some(kind) = reset_type_from_code(u16_at(payload, 0)) else {
                    self.emit(
                        events::EVT_COMMAND_ERROR,
                        EventSeverity::Error,
                        &format!("invalid restart type {}", u16_at(payload, 0)),
                    );
                    return Err(ExecError::BadArgument);
                };
                self.escalate_restart(kind, "commanded restart");
                Ok(())
            }
            codes::START_APP => {
                let name = fixed_str(&payload[0..NAME_LEN])?;
                let path = fixed_str(&payload[NAME_LEN..NAME_LEN + PATH_LEN])?;
                let symbol =
                    fixed_str(&payload[NAME_LEN + PATH_LEN..NAME_LEN + PATH_LEN + SYM_LEN])?;
                let base = NAME_LEN + PATH_LEN + SYM_LEN;
                let priority = payload[base];
                let exception_action = ExceptionAction::from_raw(payload[base + 1] as u32);
                let stack_size = u32_at(payload, base + 4);
                let params = StartParams {
                    file_path: String::from(path),
                    entry_symbol: String::from(symbol),
                    name: String::from(name),
                    priority,
                    stack_size,
                    exception_action,
                };
                match self.start_app(params, AppType::External) {
                    Ok(id) => {
                        self.emit(
                            events::EVT_APP_STARTED,
                            EventSeverity::Info,
                            &format!("app {} started by command ({})", name, id),
                        );
                        Ok(())
                    }
                    Err(err) => {
                        self.emit(
                            events::EVT_APP_START_ERROR,
                            EventSeverity::Error,
                            &format!("app {} start failed: {}", name, err),
                        );
                        Err(err)
                    }
                }
            }
            codes::STOP_APP => {
                self.app_control_command(payload, ControlRequest::SysDelete, "stop")
            }
            codes::RESTART_APP => {
                self.app_control_command(payload, ControlRequest::SysRestart, "restart")
            }
            codes::RELOAD_APP => {
                let name = fixed_str(&payload[0..NAME_LEN])?;
                let path = fixed_str(&payload[NAME_LEN..NAME_LEN + PATH_LEN])?;
                let id = self.app_id_or_command_error(name)?;
                self.request_app_reload(id, path)?;
                self.emit(
                    events::EVT_APP_STOP_QUEUED,
                    EventSeverity::Info,
                    &format!("app {} reload queued from {}", name, path),
                );
                Ok(())
            }
            codes::QUERY_ONE => {
                let name = fixed_str(&payload[0..NAME_LEN])?;
                let id = self.app_id_or_command_error(name)?;
                let info = self
                    .tables
                    .with(|t| t.app_info(id))
                    .ok_or(ExecError::NotFound)?;
                self.emit(
                    events::EVT_APP_INFO,
                    EventSeverity::Info,
                    &format!(
                        "app {} ({}): type {}, state {}, main task {}, {} child task(s)",
                        info.name,
                        info.id,
                        info.app_type.as_str(),
                        info.state.as_str(),
                        info.main_task,
                        info.child_tasks
                    ),
                );
                Ok(())
            }
            codes::QUERY_ALL => {
                let path = fixed_str(&payload[0..PATH_LEN])?;
                let records: alloc::vec::Vec<QueryAppRecord> = self.tables.with(|t| {
                    t.all_app_info()
                        .into_iter()
                        .map(|info| QueryAppRecord {
                            id: info.id.as_u32(),
                            name: info.name,
                            app_type: match info.app_type {
                                AppType::Core => 0,
                                AppType::External => 1,
                            },
                            state: String::from(info.state.as_str()),
                            file_path: info.file_path,
                            priority: info.priority,
                            stack_size: info.stack_size,
                            child_tasks: info.child_tasks,
                        })
                        .collect()
                });
                self.write_query_file(path, &records, "application")
            }
            codes::QUERY_ALL_TASKS => {
                let path = fixed_str(&payload[0..PATH_LEN])?;
                let records: alloc::vec::Vec<QueryTaskRecord> = self.tables.with(|t| {
                    t.all_task_info()
                        .into_iter()
                        .map(|info| QueryTaskRecord {
                            id: info.id.as_u32(),
                            app_id: info.app_id.as_u32(),
                            name: info.name,
                        })
                        .collect()
                });
                self.write_query_file(path, &records, "task")
            }
            codes::CLEAR_SYSLOG => {
                self.reset.with(|r| r.syslog.clear());
                self.emit(
                    events::EVT_SYSLOG_CLEARED,
                    EventSeverity::Info,
                    "system log cleared",
                );
                Ok(())
            }
            codes::WRITE_SYSLOG => {
                let path = fixed_str(&payload[0..PATH_LEN])?;
                let contents = self.reset.with(|r| r.syslog.contents());
                let result = self
                    .os
                    .open(
                        path,
                        OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                    )
                    .and_then(|file| {
                        let outcome = self.os.write(file, contents.as_bytes()).map(|_| ());
                        let _ = self.os.close(file);
                        outcome
                    });
                match result {
                    Ok(()) => {
                        self.emit(
                            events::EVT_SYSLOG_WRITTEN,
                            EventSeverity::Info,
                            &format!("system log written to {}", path),
                        );
                        Ok(())
                    }
                    Err(err) => {
                        self.emit(
                            events::EVT_COMMAND_ERROR,
                            EventSeverity::Error,
                            &format!("system log write failed: {}", err),
                        );
                        Err(err.into())
                    }
                }
            }
            codes::OVERWRITE_SYSLOG => {
                let Some(mode) = SysLogMode::from_raw(u32_at(payload, 0)) else {
                    self.emit(
                        events::EVT_COMMAND_ERROR,
                        EventSeverity::Error,
                        &format!("invalid system log mode {}", u32_at(payload, 0)),
                    );
                    return Err(ExecError::BadArgument);
                };
                self.reset.with(|r| r.syslog.set_mode(mode));
                self.emit(
                    events::EVT_SYSLOG_MODE,
                    EventSeverity::Info,
                    &format!("system log mode set to {:?}", mode),
                );
                Ok(())
            }
            codes::CLEAR_ERLOG => {
                self.reset.with(|r| r.erlog.clear());
                self.emit(
                    events::EVT_ERLOG_CLEARED,
                    EventSeverity::Info,
                    "exception/reset log cleared",
                );
                Ok(())
            }
            codes::WRITE_ERLOG => {
                let path = fixed_str(&payload[0..PATH_LEN])?;
                match self.request_erlog_dump(path) {
                    Ok(()) => {
                        self.emit(
                            events::EVT_ERLOG_PENDING,
                            EventSeverity::Info,
                            &format!("exception/reset log dump queued to {}", path),
                        );
                        Ok(())
                    }
                    Err(err @ ExecError::AlreadyPending) => {
                        self.emit(
                            events::EVT_DUMP_ALREADY_PENDING,
                            EventSeverity::Error,
                            "exception/reset log dump already pending",
                        );
                        Err(err)
                    }
                    Err(err) => Err(err),
                }
            }
            codes::START_PERF => {
                let Some(mode) = TriggerMode::from_raw(u32_at(payload, 0)) else {
                    self.emit(
                        events::EVT_COMMAND_ERROR,
                        EventSeverity::Error,
                        &format!("invalid perf trigger mode {}", u32_at(payload, 0)),
                    );
                    return Err(ExecError::BadArgument);
                };
                self.reset.with(|r| r.perf.start(mode));
                self.emit(
                    events::EVT_PERF_STARTED,
                    EventSeverity::Info,
                    &format!("perf collection started ({:?} trigger)", mode),
                );
                Ok(())
            }
            codes::STOP_PERF => {
                let path = fixed_str(&payload[0..PATH_LEN])?;
                self.reset.with(|r| r.perf.stop());
                match self.request_perf_dump(path) {
                    Ok(()) => {
                        self.emit(
                            events::EVT_PERF_STOPPED,
                            EventSeverity::Info,
                            &format!("perf collection stopped, dump queued to {}", path),
                        );
                        Ok(())
                    }
                    Err(err @ ExecError::AlreadyPending) => {
                        self.emit(
                            events::EVT_DUMP_ALREADY_PENDING,
                            EventSeverity::Error,
                            "perf dump already pending",
                        );
                        Err(err)
                    }
                    Err(err) => Err(err),
                }
            }
            codes::SET_PERF_FILTER => {
                let word = u32_at(payload, 0) as usize;
                let value = u32_at(payload, 4);
                self.perf_mask_command(word, value, true)
            }
            codes::SET_PERF_TRIGGER => {
                let word = u32_at(payload, 0) as usize;
                let value = u32_at(payload, 4);
                self.perf_mask_command(word, value, false)
            }
            codes::RESET_PR_COUNT => {
                self.reset.with(|r| r.vars.processor_reset_count = 0);
                self.store_reset_area();
                self.emit(
                    events::EVT_PR_COUNT_RESET,
                    EventSeverity::Info,
                    "processor reset counter cleared",
                );
                Ok(())
            }
            codes::SET_MAX_PR_COUNT => {
                let max = u16_at(payload, 0);
                self.reset.with(|r| r.vars.max_processor_resets = max);
                self.store_reset_area();
                self.emit(
                    events::EVT_MAX_PR_COUNT_SET,
                    EventSeverity::Info,
                    &format!("max processor reset count set to {}", max),
                );
                Ok(())
            }
            codes::DELETE_CDS => {
                let name = fixed_str(&payload[0..CDS_NAME_LEN])?;
                let is_table = payload[CDS_NAME_LEN] != 0;
                let owner_active =
                    |owner: &str| self.tables.with(|t| t.app_by_name(owner).is_some());
                match self.cds.delete_block(name, is_table, &owner_active) {
                    Ok(()) => {
                        self.emit(
                            events::EVT_CDS_DELETED,
                            EventSeverity::Info,
                            &format!("persistent store block {} deleted", name),
                        );
                        Ok(())
                    }
                    Err(err) => {
                        self.emit(
                            events::EVT_CDS_DELETE_ERROR,
                            EventSeverity::Error,
                            &format!("persistent store delete {}: {}", name, err),
                        );
                        Err(err.into())
                    }
                }
            }
            codes::DUMP_CDS_REGISTRY => {
                let path = fixed_str(&payload[0..PATH_LEN])?;
                let entries: alloc::vec::Vec<(String, bool, u32)> = self
                    .cds
                    .registry_snapshot()
                    .into_iter()
                    .map(|e| (e.name, e.table, e.size))
                    .collect();
                self.write_query_file(path, &entries, "persistent store registry")
                    .map(|()| {
                        self.emit(
                            events::EVT_CDS_DUMPED,
                            EventSeverity::Info,
                            &format!("{} registry entries dumped", entries.len()),
                        );
                    })
            }
            codes::SEND_POOL_STATS => {
                let name = fixed_str(&payload[0..NAME_LEN])?;
                match self.pool_stats(name) {
                    Some(stats) => {
                        self.emit(
                            events::EVT_POOL_STATS,
                            EventSeverity::Info,
                            &format!(
                                "pool {}: size {}, granted {}, free bytes {}, check errors {}",
                                name,
                                stats.pool_size,
                                stats.num_granted,
                                stats.free_bytes,
                                stats.check_err_count
                            ),
                        );
                        Ok(())
                    }
                    None => {
                        self.emit(
                            events::EVT_POOL_STATS_ERROR,
                            EventSeverity::Error,
                            &format!("no pool registered as {}", name),
                        );
                        Err(ExecError::NotFound)
                    }
                }
            }
            _ => unreachable!("length table covers every known code"),
        }
    }

    /// Shared tail for stop/restart commands addressed by name.
    fn app_control_command(
        &self,
        payload: &[u8],
        request: ControlRequest,
        verb: &str,
    ) -> ExecResult<()> {
        let name = fixed_str(&payload[0..NAME_LEN])?;
        let id = self.app_id_or_command_error(name)?;
        self.request_app_control(id, request)?;
        self.emit(
            events::EVT_APP_STOP_QUEUED,
            EventSeverity::Info,
            &format!("app {} {} queued", name, verb),
        );
        Ok(())
    }

    fn app_id_or_command_error(&self, name: &str) -> ExecResult<crate::resource::ResourceId> {
        match self.tables.with(|t| t.app_by_name(name)) {
            Some(id) => Ok(id),
            None => {
                self.emit(
                    events::EVT_COMMAND_ERROR,
                    EventSeverity::Error,
                    &format!("no application named {}", name),
                );
                Err(ExecError::NotFound)
            }
        }
    }

    fn perf_mask_command(&self, word: usize, value: u32, filter: bool) -> ExecResult<()> {
        let result = self.reset.with(|r| {
            if filter {
                r.perf.set_filter_word(word, value)
            } else {
                r.perf.set_trigger_word(word, value)
            }
        });
        let which = if filter { "filter" } else { "trigger" };
        match result {
            Ok(()) => {
                self.emit(
                    events::EVT_PERF_MASK_SET,
                    EventSeverity::Info,
                    &format!("perf {} mask word {} set to {:#010x}", which, word, value),
                );
                Ok(())
            }
            Err(err) => {
                self.emit(
                    events::EVT_PERF_MASK_ERROR,
                    EventSeverity::Error,
                    &format!("perf {} mask word {} out of range", which, word),
                );
                Err(err)
            }
        }
    }

    fn write_query_file<T: Serialize>(
        &self,
        path: &str,
        records: &T,
        what: &str,
    ) -> ExecResult<()> {
        let bytes = postcard::to_allocvec(records).map_err(|_| ExecError::BadArgument)?;
        let result = self
            .os
            .open(
                path,
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            )
            .and_then(|file| {
                let outcome = self.os.write(file, &bytes).map(|_| ());
                let _ = self.os.close(file);
                outcome
            });
        match result {
            Ok(()) => {
                self.emit(
                    events::EVT_QUERY_WRITTEN,
                    EventSeverity::Info,
                    &format!("{} query written to {}", what, path),
                );
                Ok(())
            }
            Err(err) => {
                self.emit(
                    events::EVT_QUERY_ERROR,
                    EventSeverity::Error,
                    &format!("{} query write failed: {}", what, err),
                );
                Err(err.into())
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────
