//! Exception attribution
//!
//! The periodic exception scan drains newly captured hardware/software
//! exceptions from the platform, attributes each to an owning
//! application through its task context, and applies the application's
//! configured exception action. Failure to attribute an exception is
//! non-fatal; that scan cycle simply skips it.

use alloc::format;

use kestrel_platform::{EventSeverity, ResetType};

use crate::apps::{AppState, AppType, ControlRequest, ExceptionAction};
use crate::erlog::{ErLogEntry, ErLogKind};
use crate::events;
use crate::state::Executive;

impl Executive {
    /// Drain and act on pending exceptions.
    pub fn scan_exceptions(&self) {
        while self.psp.exception_count() > 0 {
            let Some(info) = self.psp.take_exception() else {
                // Summary unavailable: skip for this scan cycle.
                return;
            };

            let now = self.os.ticks_ms();
            self.reset.with(|r| {
                r.erlog.write(ErLogEntry {
                    kind: ErLogKind::Exception,
                    reset_type: r.vars.reset_type,
                    reset_subtype: r.vars.reset_subtype,
                    processor_reset_count: r.vars.processor_reset_count,
                    description: info.description.clone(),
                    context_id: info.context_id,
                    time_ms: now,
                });
            });

            let attribution = info.task.and_then(|handle| {
                self.tables.with(|t| {
                    let task_id = t.task_by_handle(handle)?;
                    let app_id = t.tasks.locate(task_id)?.app_id;
                    let app = t.apps.locate(app_id)?;
                    Some((
                        app_id,
                        app.app_type,
                        app.start.exception_action,
                        app.start.name.clone(),
                    ))
                })
            });

            let Some((app_id, app_type, action, name)) = attribution else {
                log::warn!(
                    "[exec] exception context {} not attributable, skipping",
                    info.context_id
                );
                continue;
            };

            if app_type == AppType::External && action == ExceptionAction::RestartApp {
                // App-local recovery: queue a restart, no system-level
                // action.
                self.tables.with(|t| {
                    if let Some(app) = t.apps.locate_mut(app_id) {
                        app.request = ControlRequest::SysRestart;
                        app.state = AppState::Waiting;
                        app.timer_ms = 0;
                    }
                });
                self.emit(
                    events::EVT_EXCEPTION_APP_RESTART,
                    EventSeverity::Error,
                    &format!(
                        "exception {} in app {}, restart queued",
                        info.context_id, name
                    ),
                );
            } else {
                self.escalate_restart(
                    ResetType::Processor,
                    &format!("exception {} in {} application {}",
                        info.context_id,
                        app_type.as_str(),
                        name
                    ),
                );
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────
