//! Application control
//!
//! Creation, control-request processing, and best-effort teardown. The
//! periodic table scan drives `Waiting` grace timers and dispatches
//! pending requests; every teardown sub-step runs regardless of earlier
//! failures, so one stuck resource cannot pin the rest.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use kestrel_platform::{EventSeverity, ResetType, TaskHandle, TaskSpec};

use crate::apps::{AppState, AppType, ControlRequest, StartParams};
use crate::config::{APP_KILL_TIMEOUT_MS, MAX_APP_NAME_LEN, MAX_PATH_LEN, MAX_SYM_LEN};
use crate::error::{ExecError, ExecResult};
use crate::events;
use crate::resource::ResourceId;
use crate::state::Executive;

/// Which recreate flavor a teardown is followed by.
#[derive(Clone, Copy)]
enum RestartKind {
    Restart,
    Reload,
}

impl Executive {
    /// Create an application: load its module, resolve its entry,
    /// start its main task, and fill the registry records.
    ///
    /// Core applications pass an empty file path and load no module.
    pub fn start_app(&self, params: StartParams, app_type: AppType) -> ExecResult<ResourceId> {
        if params.name.is_empty()
            || params.name.len() > MAX_APP_NAME_LEN
            || params.file_path.len() > MAX_PATH_LEN
            || params.entry_symbol.len() > MAX_SYM_LEN
        {
            return Err(ExecError::BadArgument);
        }

        let module = if params.file_path.is_empty() {
            None
        } else {
            Some(self.os.load_module(&params.file_path)?)
        };
        if let Some(m) = module {
            // The entry must resolve before anything is committed.
            if let Err(err) = self.os.lookup_symbol(m, &params.entry_symbol) {
                let _ = self.os.unload_module(m);
                return Err(err.into());
            }
        }

        let spec = TaskSpec {
            name: params.name.clone(),
            entry_symbol: params.entry_symbol.clone(),
            module,
            priority: params.priority,
            stack_size: params.stack_size,
        };
        let handle = match self.os.create_task(&spec) {
            Ok(h) => h,
            Err(err) => {
                if let Some(m) = module {
                    let _ = self.os.unload_module(m);
                }
                return Err(err.into());
            }
        };

        let result = self.tables.with(|t| {
            let app_id = match t.apps.reserve() {
                Ok(id) => id,
                Err(err) => return Err(err),
            };
            let task_id = match t.tasks.reserve() {
                Ok(id) => id,
                Err(err) => {
                    let _ = t.apps.release(app_id);
                    return Err(err);
                }
            };

            let task = t.tasks.locate_mut(task_id).ok_or(ExecError::NotFound)?;
            task.app_id = app_id;
            task.name = params.name.clone();
            task.handle = Some(handle);

            let app = t.apps.locate_mut(app_id).ok_or(ExecError::NotFound)?;
            app.app_type = app_type;
            app.state = AppState::EarlyInit;
            app.start = params.clone();
            app.request = ControlRequest::None;
            app.timer_ms = 0;
            app.main_task = task_id;
            app.child_tasks = 0;
            app.module = module;
            app.reload_path = None;

            match app_type {
                AppType::Core => t.registered_core += 1,
                AppType::External => t.registered_external += 1,
            }
            Ok(app_id)
        });

        match result {
            Ok(app_id) => {
                log::info!(
                    "[exec] started {} application '{}' ({})",
                    app_type.as_str(),
                    params.name,
                    app_id
                );
                Ok(app_id)
            }
            Err(err) => {
                // Roll the OS side back; the table transaction never
                // committed.
                let _ = self.os.delete_task(handle);
                if let Some(m) = module {
                    let _ = self.os.unload_module(m);
                }
                Err(err)
            }
        }
    }

    /// Create a child task under an application. Child tasks share the
    /// task table with main tasks and are torn down with their owner.
    pub fn create_child_task(
        &self,
        app_id: ResourceId,
        name: &str,
        priority: u8,
        stack_size: u32,
    ) -> ExecResult<ResourceId> {
        if name.is_empty() || name.len() > MAX_APP_NAME_LEN {
            return Err(ExecError::BadArgument);
        }
        if self.tables.with(|t| t.apps.locate(app_id).is_none()) {
            return Err(ExecError::NotFound);
        }
        let spec = TaskSpec {
            name: String::from(name),
            entry_symbol: String::new(),
            module: None,
            priority,
            stack_size,
        };
        let handle = self.os.create_task(&spec)?;

        let result = self.tables.with(|t| {
            let task_id = t.tasks.reserve()?;
            let task = t.tasks.locate_mut(task_id).ok_or(ExecError::NotFound)?;
            task.app_id = app_id;
            task.name = String::from(name);
            task.handle = Some(handle);
            if let Some(app) = t.apps.locate_mut(app_id) {
                app.child_tasks += 1;
            }
            Ok(task_id)
        });
        if result.is_err() {
            let _ = self.os.delete_task(handle);
        }
        result
    }

    /// Delete a child task. An application's main task is not deletable
    /// this way; stopping the application is the only route.
    pub fn delete_child_task(&self, task_id: ResourceId) -> ExecResult<()> {
        let handle = self.tables.with(|t| {
            let task = t.tasks.locate(task_id).ok_or(ExecError::NotFound)?;
            let app_id = task.app_id;
            let handle = task.handle;
            let app = t.apps.locate(app_id).ok_or(ExecError::NotFound)?;
            if app.main_task == task_id {
                return Err(ExecError::BadArgument);
            }
            if let Some(app) = t.apps.locate_mut(app_id) {
                app.child_tasks = app.child_tasks.saturating_sub(1);
            }
            let _ = t.tasks.release(task_id);
            Ok(handle)
        })?;
        if let Some(h) = handle {
            if self.os.delete_task(h).is_err() {
                log::warn!("[exec] child task {} already gone at OS level", task_id);
            }
        }
        Ok(())
    }

    /// Record that an application completed its own initialization and
    /// is running.
    pub fn mark_app_running(&self, id: ResourceId) -> ExecResult<()> {
        self.tables.with(|t| {
            let app = t.apps.locate_mut(id).ok_or(ExecError::NotFound)?;
            app.state = AppState::Running;
            Ok(())
        })
    }

    /// Application self-report on exit: the task is down and the numeric
    /// run status becomes the pending control request.
    pub fn report_app_exit(&self, id: ResourceId, raw_status: u32) -> ExecResult<()> {
        self.tables.with(|t| {
            let app = t.apps.locate_mut(id).ok_or(ExecError::NotFound)?;
            app.state = AppState::Stopped;
            app.request = ControlRequest::from_raw(raw_status);
            Ok(())
        })
    }

    /// Queue a control request against an application.
    ///
    /// A running application moves to `Waiting` and gets the grace
    /// timer; the scan dispatches the request when the timer expires or
    /// the application stops on its own. Removal requests against a core
    /// application escalate to a whole-system restart immediately.
    pub fn request_app_control(&self, id: ResourceId, request: ControlRequest) -> ExecResult<()> {
        let escalate = self.tables.with(|t| {
            let app = t.apps.locate_mut(id).ok_or(ExecError::NotFound)?;
            if app.app_type == AppType::Core
                && !matches!(request, ControlRequest::None | ControlRequest::AppRun)
            {
                return Ok::<_, ExecError>(Some((request, app.start.name.clone())));
            }
            app.request = request;
            if app.state == AppState::Running {
                app.state = AppState::Waiting;
                app.timer_ms = APP_KILL_TIMEOUT_MS;
            }
            Ok::<_, ExecError>(None)
        })?;
        if let Some((request, name)) = escalate {
            self.escalate_restart(
                ResetType::Processor,
                &format!("{} requested on core application {}", request.as_str(), name),
            );
        }
        Ok(())
    }

    /// Queue a reload with a substitute module path.
    pub fn request_app_reload(&self, id: ResourceId, new_path: &str) -> ExecResult<()> {
        if new_path.is_empty() || new_path.len() > MAX_PATH_LEN {
            return Err(ExecError::BadArgument);
        }
        self.tables.with(|t| {
            let app = t.apps.locate_mut(id).ok_or(ExecError::NotFound)?;
            app.reload_path = Some(String::from(new_path));
            Ok::<_, ExecError>(())
        })?;
        self.request_app_control(id, ControlRequest::SysReload)
    }

    /// One pass over the application table.
    ///
    /// `Waiting` records count their grace timers down by `elapsed_ms`
    /// and dispatch at zero; `Stopped` records with a pending request
    /// dispatch immediately.
    pub fn scan_app_table(&self, elapsed_ms: u32) {
        let due: Vec<ResourceId> = self.tables.with(|t| {
            let mut due = Vec::new();
            for (id, app) in t.apps.iter_used_mut() {
                match app.state {
                    AppState::Waiting => {
                        app.timer_ms = app.timer_ms.saturating_sub(elapsed_ms);
                        if app.timer_ms == 0 && app.request != ControlRequest::None {
                            due.push(id);
                        }
                    }
                    AppState::Stopped => {
                        if app.request != ControlRequest::None {
                            due.push(id);
                        }
                    }
                    _ => {}
                }
            }
            due
        });
        for id in due {
            self.process_control_request(id);
        }
    }

    /// Dispatch one application's pending control request.
    pub(crate) fn process_control_request(&self, id: ResourceId) {
        let info = self.tables.with(|t| {
            t.apps.locate(id).map(|app| {
                (
                    app.app_type,
                    app.request,
                    app.start.clone(),
                    app.reload_path.clone(),
                )
            })
        });
        let Some((app_type, request, params, reload_path)) = info else {
            return;
        };
        let name = params.name.clone();

        // A value outside the defined set is an internal error; fail
        // safe toward removal.
        let request = if let ControlRequest::Unknown(raw) = request {
            self.emit(
                events::EVT_INVALID_CONTROL_REQUEST,
                EventSeverity::Error,
                &format!("app {}: unknown control request {}, deleting", name, raw),
            );
            ControlRequest::SysDelete
        } else {
            request
        };

        // Core applications are essential; any terminal request takes
        // the whole node down instead of acting app-locally.
        if app_type == AppType::Core
            && !matches!(request, ControlRequest::None | ControlRequest::AppRun)
        {
            self.escalate_restart(
                ResetType::Processor,
                &format!("{} on core application {}", request.as_str(), name),
            );
            return;
        }

        match request {
            ControlRequest::None => {}
            ControlRequest::AppRun => {
                let _ = self.tables.with(|t| {
                    if let Some(app) = t.apps.locate_mut(id) {
                        app.request = ControlRequest::None;
                        app.state = AppState::Running;
                    }
                });
            }
            ControlRequest::AppExit | ControlRequest::AppError | ControlRequest::SysDelete => {
                match self.cleanup_app(id) {
                    Ok(()) => self.emit(
                        events::EVT_APP_CLEANUP,
                        EventSeverity::Info,
                        &format!("app {} removed ({})", name, request.as_str()),
                    ),
                    Err(err) => self.emit(
                        events::EVT_APP_CLEANUP_ERROR,
                        EventSeverity::Error,
                        &format!("app {} cleanup: {}", name, err),
                    ),
                }
            }
            ControlRequest::SysRestart => {
                self.restart_app_with(id, &name, params, RestartKind::Restart);
            }
            ControlRequest::SysReload => {
                let mut params = params;
                if let Some(path) = reload_path {
                    params.file_path = path;
                }
                self.restart_app_with(id, &name, params, RestartKind::Reload);
            }
            ControlRequest::SysException => {
                self.escalate_restart(
                    ResetType::Processor,
                    &format!("exception reported by application {}", name),
                );
            }
            ControlRequest::Unknown(_) => unreachable!("normalized above"),
        }
    }

    /// Shared restart/reload tail: tear down, then recreate from the
    /// given parameters. "Could not stop" and "stopped but could not
    /// restart" are reported distinctly.
    fn restart_app_with(
        &self,
        id: ResourceId,
        name: &str,
        params: StartParams,
        kind: RestartKind,
    ) {
        let (ok_evt, err_evt, verb) = match kind {
            RestartKind::Restart => (
                events::EVT_APP_RESTARTED,
                events::EVT_APP_RESTART_ERROR,
                "restart",
            ),
            RestartKind::Reload => (
                events::EVT_APP_RELOADED,
                events::EVT_APP_RELOAD_ERROR,
                "reload",
            ),
        };
        if let Err(err) = self.cleanup_app(id) {
            self.emit(
                err_evt,
                EventSeverity::Error,
                &format!("app {} {}: could not stop: {}", name, verb, err),
            );
            return;
        }
        match self.start_app(params, AppType::External) {
            Ok(new_id) => self.emit(
                ok_evt,
                EventSeverity::Info,
                &format!("app {} {}ed ({})", name, verb, new_id),
            ),
            Err(err) => self.emit(
                err_evt,
                EventSeverity::Error,
                &format!("app {} stopped but could not {}: {}", name, verb, err),
            ),
        }
    }

    /// Best-effort teardown of an application and everything it owns.
    ///
    /// Every sub-step runs regardless of earlier failures; the failure
    /// count is aggregated and reported once at the end. The slot is
    /// freed in all cases so the table cannot leak records.
    pub(crate) fn cleanup_app(&self, id: ResourceId) -> ExecResult<()> {
        let (name, failures) = self.tables.with(|t| {
            let app = t.apps.locate(id).ok_or(ExecError::NotFound)?;
            let name = app.start.name.clone();
            let main_task = app.main_task;
            let module = app.module;
            let app_type = app.app_type;
            let mut failures = 0u32;

            // The recorded main task must still resolve to a task this
            // application owns; corrupted state is a cleanup error but
            // never spreads to unrelated slots.
            match t.tasks.locate(main_task) {
                Some(task) if task.app_id == id => {}
                _ => {
                    log::error!("[exec] app {}: main task back-reference invalid", name);
                    failures += 1;
                }
            }

            let owned: Vec<(ResourceId, Option<TaskHandle>)> = t
                .tasks
                .iter_used()
                .filter(|(_, r)| r.app_id == id)
                .map(|(tid, r)| (tid, r.handle))
                .collect();
            for (tid, handle) in owned {
                if let Some(h) = handle {
                    for obj in self.os.owned_objects(h) {
                        if self.os.delete_object(&obj).is_err() {
                            log::warn!(
                                "[exec] app {}: failed deleting {} during cleanup",
                                name,
                                obj.kind()
                            );
                            failures += 1;
                        }
                    }
                    if self.os.delete_task(h).is_err() {
                        failures += 1;
                    }
                }
                let _ = t.tasks.release(tid);
            }

            if let Some(m) = module {
                if self.os.unload_module(m).is_err() {
                    failures += 1;
                }
            }

            match app_type {
                AppType::Core => t.registered_core = t.registered_core.saturating_sub(1),
                AppType::External => {
                    t.registered_external = t.registered_external.saturating_sub(1)
                }
            }
            let _ = t.apps.release(id);
            Ok::<_, ExecError>((name, failures))
        })?;

        self.emit(
            events::EVT_APP_CLEANUP,
            EventSeverity::Debug,
            &format!("app {} resources cleaned up", name),
        );
        if failures > 0 {
            Err(ExecError::CleanupFailed(failures))
        } else {
            Ok(())
        }
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::apps::{AppState, AppType, ControlRequest};
    use crate::config::{APP_KILL_TIMEOUT_MS, MAX_APPLICATIONS};
    use crate::error::ExecError;
    use crate::events;
    use crate::resource::ResourceId;
    use crate::testutil::{harness, params};
    use alloc::string::String;
    use kestrel_platform::{OsObject, ResetType};

    #[test]
    fn test_start_app_and_query() {
        let h = harness(0);
        let id = h.exec.start_app(params("COMM"), AppType::External).unwrap();
        let info = h.exec.app_info(id).unwrap();
        assert_eq!(info.name, "COMM");
        assert_eq!(info.state, AppState::EarlyInit);
        assert_eq!(info.app_type, AppType::External);
        assert!(info.main_task.is_defined());
        assert_eq!(h.os.task_count(), 1);
        assert_eq!(h.os.module_count(), 1);
    }

    #[test]
    fn test_start_app_bad_arguments() {
        let h = harness(0);
        let mut p = params("COMM");
        p.name = String::new();
        assert_eq!(
            h.exec.start_app(p, AppType::External).err(),
            Some(ExecError::BadArgument)
        );
        let mut p = params("COMM");
        p.name = "N".repeat(crate::config::MAX_APP_NAME_LEN + 1);
        assert_eq!(
            h.exec.start_app(p, AppType::External).err(),
            Some(ExecError::BadArgument)
        );
    }

    #[test]
    fn test_start_app_table_full_rolls_back_os_state() {
        let h = harness(0);
        for i in 0..MAX_APPLICATIONS {
            h.exec
                .start_app(params(&alloc::format!("APP{}", i)), AppType::External)
                .unwrap();
        }
        assert_eq!(
            h.exec.start_app(params("EXTRA"), AppType::External).err(),
            Some(ExecError::RegistryFull)
        );
        // The overflow attempt's task and module were rolled back.
        assert_eq!(h.os.task_count(), MAX_APPLICATIONS);
        assert_eq!(h.os.module_count(), MAX_APPLICATIONS);
    }

    #[test]
    fn test_module_load_failure_surfaces() {
        let h = harness(0);
        h.os.inner
            .lock()
            .fail_load
            .insert(String::from("/ld/comm.so"));
        assert!(matches!(
            h.exec.start_app(params("COMM"), AppType::External),
            Err(ExecError::Os(_))
        ));
        assert_eq!(h.os.task_count(), 0);
    }

    #[test]
    fn test_missing_entry_symbol_unloads_module() {
        let h = harness(0);
        h.os.inner
            .lock()
            .missing_symbols
            .insert(String::from("comm_main"));
        assert!(h.exec.start_app(params("COMM"), AppType::External).is_err());
        assert_eq!(h.os.module_count(), 0);
        assert_eq!(h.os.task_count(), 0);
    }

    #[test]
    fn test_stop_request_honors_grace_timer() {
        let h = harness(0);
        let id = h.exec.start_app(params("COMM"), AppType::External).unwrap();
        h.exec.mark_app_running(id).unwrap();
        h.exec
            .request_app_control(id, ControlRequest::SysDelete)
            .unwrap();
        assert_eq!(h.exec.app_info(id).unwrap().state, AppState::Waiting);

        // elapsed < T: timer decrements by exactly the elapsed amount
        // and nothing is dispatched.
        h.exec.scan_app_table(APP_KILL_TIMEOUT_MS - 1);
        assert!(h.exec.app_info(id).is_some());

        // The final millisecond expires the timer and dispatches.
        h.exec.scan_app_table(1);
        assert!(h.exec.app_info(id).is_none());
        assert_eq!(h.os.task_count(), 0);
        assert_eq!(h.os.module_count(), 0);
        assert!(h.events.has(events::EVT_APP_CLEANUP));
    }

    #[test]
    fn test_stopped_app_dispatches_immediately() {
        let h = harness(0);
        let id = h.exec.start_app(params("COMM"), AppType::External).unwrap();
        h.exec.mark_app_running(id).unwrap();
        // Status 2 is APP_EXIT.
        h.exec.report_app_exit(id, 2).unwrap();
        h.exec.scan_app_table(0);
        assert!(h.exec.app_info(id).is_none());
    }

    #[test]
    fn test_unknown_control_request_fails_safe_to_delete() {
        let h = harness(0);
        let id = h.exec.start_app(params("COMM"), AppType::External).unwrap();
        h.exec.report_app_exit(id, 99).unwrap();
        h.exec.scan_app_table(0);
        assert!(h.exec.app_info(id).is_none());
        assert!(h.events.has(events::EVT_INVALID_CONTROL_REQUEST));
    }

    #[test]
    fn test_core_app_removal_escalates_whole_system() {
        let h = harness(0);
        let mut p = params("EXEC_CORE");
        p.file_path = String::new();
        p.entry_symbol = String::from("core_main");
        let id = h.exec.start_app(p, AppType::Core).unwrap();
        h.exec.mark_app_running(id).unwrap();

        h.exec
            .request_app_control(id, ControlRequest::SysRestart)
            .unwrap();
        assert_eq!(h.psp.restart_requests(), alloc::vec![ResetType::Processor]);
        // No app-local action was taken.
        assert!(h.exec.app_info(id).is_some());
    }

    #[test]
    fn test_restart_recreates_from_stored_parameters() {
        let h = harness(0);
        let id = h.exec.start_app(params("COMM"), AppType::External).unwrap();
        h.exec.mark_app_running(id).unwrap();
        h.exec
            .request_app_control(id, ControlRequest::SysRestart)
            .unwrap();
        h.exec.scan_app_table(APP_KILL_TIMEOUT_MS);

        assert!(h.exec.app_info(id).is_none());
        let new_id = h.exec.app_id_by_name("COMM").unwrap();
        assert_ne!(new_id, id);
        let info = h.exec.app_info(new_id).unwrap();
        assert_eq!(info.file_path, "/ld/comm.so");
        assert!(h.events.has(events::EVT_APP_RESTARTED));
        assert!(h.psp.restart_requests().is_empty());
    }

    #[test]
    fn test_restart_cleanup_failure_reported_distinctly() {
        let h = harness(0);
        let id = h.exec.start_app(params("COMM"), AppType::External).unwrap();
        h.exec.mark_app_running(id).unwrap();
        let handle = h.os.task_handle_by_name("COMM").unwrap();
        h.os.inner
            .lock()
            .owned
            .insert(handle.0, alloc::vec![OsObject::Mutex(1)]);
        h.os.inner.lock().fail_delete_object = true;

        h.exec
            .request_app_control(id, ControlRequest::SysRestart)
            .unwrap();
        h.exec.scan_app_table(APP_KILL_TIMEOUT_MS);

        let texts = h.events.texts(events::EVT_APP_RESTART_ERROR);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("could not stop"));
    }

    #[test]
    fn test_restart_recreate_failure_reported_distinctly() {
        let h = harness(0);
        let id = h.exec.start_app(params("COMM"), AppType::External).unwrap();
        h.exec.mark_app_running(id).unwrap();
        h.exec
            .request_app_control(id, ControlRequest::SysRestart)
            .unwrap();
        h.os.inner.lock().fail_create_task = true;
        h.exec.scan_app_table(APP_KILL_TIMEOUT_MS);

        let texts = h.events.texts(events::EVT_APP_RESTART_ERROR);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("stopped but could not restart"));
        assert!(h.exec.app_id_by_name("COMM").is_none());
    }

    #[test]
    fn test_reload_uses_substitute_path() {
        let h = harness(0);
        let id = h.exec.start_app(params("COMM"), AppType::External).unwrap();
        h.exec.mark_app_running(id).unwrap();
        h.exec.request_app_reload(id, "/ld/comm_v2.so").unwrap();
        h.exec.scan_app_table(APP_KILL_TIMEOUT_MS);

        let new_id = h.exec.app_id_by_name("COMM").unwrap();
        assert_eq!(h.exec.app_info(new_id).unwrap().file_path, "/ld/comm_v2.so");
        assert!(h.events.has(events::EVT_APP_RELOADED));
    }

    #[test]
    fn test_cleanup_aggregates_failures_without_stopping() {
        let h = harness(0);
        let id = h.exec.start_app(params("COMM"), AppType::External).unwrap();
        let handle = h.os.task_handle_by_name("COMM").unwrap();
        h.os.inner.lock().owned.insert(
            handle.0,
            alloc::vec![OsObject::Mutex(1), OsObject::Queue(2)],
        );
        h.os.inner.lock().fail_delete_object = true;

        // Both object deletions fail; the task, module, and slot are
        // still torn down.
        assert_eq!(h.exec.cleanup_app(id).err(), Some(ExecError::CleanupFailed(2)));
        assert!(h.exec.app_info(id).is_none());
        assert_eq!(h.os.task_count(), 0);
        assert_eq!(h.os.module_count(), 0);
    }

    #[test]
    fn test_corrupted_main_task_is_cleanup_error_and_isolated() {
        let h = harness(0);
        let victim = h.exec.start_app(params("COMM"), AppType::External).unwrap();
        let other = h.exec.start_app(params("SCHED"), AppType::External).unwrap();

        // Corrupt the victim's main-task back-reference.
        h.exec.tables.with(|t| {
            t.apps.locate_mut(victim).unwrap().main_task = ResourceId::UNDEFINED;
        });

        assert_eq!(
            h.exec.cleanup_app(victim).err(),
            Some(ExecError::CleanupFailed(1))
        );
        // Unrelated slots are untouched.
        let info = h.exec.app_info(other).unwrap();
        assert_eq!(info.name, "SCHED");
        assert!(h.exec.tables.with(|t| t.tasks.locate(info.main_task).is_some()));
    }

    #[test]
    fn test_child_tasks_created_and_cleaned_up() {
        let h = harness(0);
        let id = h.exec.start_app(params("COMM"), AppType::External).unwrap();
        let child = h.exec.create_child_task(id, "COMM_WORKER", 80, 1024).unwrap();

        assert_eq!(h.exec.app_info(id).unwrap().child_tasks, 1);
        assert_eq!(h.exec.all_tasks().len(), 2);
        assert_eq!(h.os.task_count(), 2);

        // Teardown removes the child along with everything else.
        h.exec.cleanup_app(id).unwrap();
        assert!(h.exec.all_tasks().is_empty());
        assert_eq!(h.os.task_count(), 0);
        // The child id is stale afterwards.
        assert_eq!(h.exec.delete_child_task(child).err(), Some(ExecError::NotFound));
    }

    #[test]
    fn test_delete_child_task_rejects_main_task() {
        let h = harness(0);
        let id = h.exec.start_app(params("COMM"), AppType::External).unwrap();
        let main_task = h.exec.app_info(id).unwrap().main_task;
        assert_eq!(
            h.exec.delete_child_task(main_task).err(),
            Some(ExecError::BadArgument)
        );

        let child = h.exec.create_child_task(id, "COMM_WORKER", 80, 1024).unwrap();
        h.exec.delete_child_task(child).unwrap();
        assert_eq!(h.exec.app_info(id).unwrap().child_tasks, 0);
        assert_eq!(h.exec.all_tasks().len(), 1);
    }

    #[test]
    fn test_registered_counters_track_types() {
        let h = harness(0);
        let mut core = params("CORE_SVC");
        core.file_path = String::new();
        h.exec.start_app(core, AppType::Core).unwrap();
        let ext = h.exec.start_app(params("COMM"), AppType::External).unwrap();
        assert_eq!(h.exec.tables.with(|t| (t.registered_core, t.registered_external)), (1, 1));
        h.exec.cleanup_app(ext).unwrap();
        assert_eq!(h.exec.tables.with(|t| (t.registered_core, t.registered_external)), (1, 0));
    }
}
