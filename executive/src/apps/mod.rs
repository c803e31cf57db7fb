//! Application, task, and library records
//!
//! Record types for the lifecycle tables, plus the aggregate `Tables`
//! struct guarded by the single shared-data lock. The control-request
//! scan and cleanup paths live in `control`; exception attribution in
//! `exception`.

pub mod control;
pub mod exception;

use alloc::string::String;

use kestrel_platform::{ModuleHandle, TaskHandle};

use crate::config;
use crate::resource::counters::CounterRecord;
use crate::resource::{ResourceId, ResourceKind, SlotTable};

// ── Lifecycle types ─────────────────────────────────────────

/// Application type discriminator.
///
/// Core applications are essential services; they never transition
/// through restart/reload, and any request to remove one escalates to a
/// full system restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppType {
    Core,
    #[default]
    External,
}

impl AppType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::Core => "CORE",
            AppType::External => "EXTERNAL",
        }
    }
}

/// Application lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    /// Slot reserved, task not yet running.
    #[default]
    EarlyInit,
    /// The application's own initialization is underway.
    LateInit,
    /// Normal operation.
    Running,
    /// A control request is queued and the grace timer is counting down.
    Waiting,
    /// The application's task has exited; cleanup is pending.
    Stopped,
}

impl AppState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::EarlyInit => "EARLY_INIT",
            AppState::LateInit => "LATE_INIT",
            AppState::Running => "RUNNING",
            AppState::Waiting => "WAITING",
            AppState::Stopped => "STOPPED",
        }
    }
}

/// Pending control request for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlRequest {
    #[default]
    None,
    AppRun,
    AppExit,
    AppError,
    SysException,
    SysRestart,
    SysReload,
    SysDelete,
    /// A value outside the defined set, as self-reported by an
    /// application. Processed as `SysDelete` after an internal-error
    /// event.
    Unknown(u32),
}

impl ControlRequest {
    /// Decode a numeric run-status as reported across the app boundary.
    pub fn from_raw(raw: u32) -> ControlRequest {
        match raw {
            1 => ControlRequest::AppRun,
            2 => ControlRequest::AppExit,
            3 => ControlRequest::AppError,
            4 => ControlRequest::SysException,
            5 => ControlRequest::SysRestart,
            6 => ControlRequest::SysReload,
            7 => ControlRequest::SysDelete,
            other => ControlRequest::Unknown(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlRequest::None => "NONE",
            ControlRequest::AppRun => "APP_RUN",
            ControlRequest::AppExit => "APP_EXIT",
            ControlRequest::AppError => "APP_ERROR",
            ControlRequest::SysException => "SYS_EXCEPTION",
            ControlRequest::SysRestart => "SYS_RESTART",
            ControlRequest::SysReload => "SYS_RELOAD",
            ControlRequest::SysDelete => "SYS_DELETE",
            ControlRequest::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Action taken when an exception is attributed to an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExceptionAction {
    /// Restart the owning application (external applications only).
    #[default]
    RestartApp,
    /// Restart the whole processor.
    RestartProcessor,
}

impl ExceptionAction {
    /// Decode the manifest field. Zero selects app restart; anything
    /// else restarts the processor.
    pub fn from_raw(raw: u32) -> ExceptionAction {
        if raw == 0 {
            ExceptionAction::RestartApp
        } else {
            ExceptionAction::RestartProcessor
        }
    }
}

/// Start parameters, retained for restart/reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartParams {
    pub file_path: String,
    pub entry_symbol: String,
    pub name: String,
    pub priority: u8,
    pub stack_size: u32,
    pub exception_action: ExceptionAction,
}

// ── Records ─────────────────────────────────────────────────

/// One application slot.
#[derive(Debug, Clone, Default)]
pub struct AppRecord {
    pub app_type: AppType,
    pub state: AppState,
    pub start: StartParams,
    /// Pending control request, consumed by the table scan.
    pub request: ControlRequest,
    /// Grace-period countdown while in `Waiting`, in ms.
    pub timer_ms: u32,
    /// Main task back-reference.
    pub main_task: ResourceId,
    /// Child tasks currently owned (main task excluded).
    pub child_tasks: u32,
    /// Loaded module backing this application, if any.
    pub module: Option<ModuleHandle>,
    /// Substitute path for a pending `SysReload`.
    pub reload_path: Option<String>,
}

/// One task slot. A task record is valid only while its owning
/// application id resolves to a used application slot.
#[derive(Debug, Clone, Default)]
pub struct TaskRecord {
    pub app_id: ResourceId,
    pub name: String,
    pub handle: Option<TaskHandle>,
}

/// One library slot. Libraries load and initialize once; there is no
/// stop state machine.
#[derive(Debug, Clone, Default)]
pub struct LibRecord {
    pub name: String,
    pub module: Option<ModuleHandle>,
}

// ── Aggregate tables ────────────────────────────────────────

/// Every table guarded by the shared-data lock.
pub struct Tables {
    pub apps: SlotTable<AppRecord>,
    pub tasks: SlotTable<TaskRecord>,
    pub libs: SlotTable<LibRecord>,
    pub counters: SlotTable<CounterRecord>,
    /// Registered core applications.
    pub registered_core: u32,
    /// Registered external applications.
    pub registered_external: u32,
}

impl Tables {
    pub fn new() -> Tables {
        Tables {
            apps: SlotTable::new(ResourceKind::App, config::MAX_APPLICATIONS),
            tasks: SlotTable::new(ResourceKind::Task, config::MAX_TASKS),
            libs: SlotTable::new(ResourceKind::Lib, config::MAX_LIBRARIES),
            counters: SlotTable::new(ResourceKind::Counter, config::MAX_GEN_COUNTERS),
            registered_core: 0,
            registered_external: 0,
        }
    }

    /// Application id registered under `name`, if any.
    pub fn app_by_name(&self, name: &str) -> Option<ResourceId> {
        self.apps
            .iter_used()
            .find(|(_, r)| r.start.name == name)
            .map(|(id, _)| id)
    }

    /// Task id owning the given OS task handle, if any.
    pub fn task_by_handle(&self, handle: TaskHandle) -> Option<ResourceId> {
        self.tasks
            .iter_used()
            .find(|(_, r)| r.handle == Some(handle))
            .map(|(id, _)| id)
    }
}

impl Default for Tables {
    fn default() -> Self {
        Tables::new()
    }
}

// ── Snapshots ───────────────────────────────────────────────

/// Read-only application view for queries and telemetry.
#[derive(Debug, Clone)]
pub struct AppInfo {
    pub id: ResourceId,
    pub name: String,
    pub app_type: AppType,
    pub state: AppState,
    pub file_path: String,
    pub priority: u8,
    pub stack_size: u32,
    pub main_task: ResourceId,
    pub child_tasks: u32,
}

/// Read-only task view.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub id: ResourceId,
    pub app_id: ResourceId,
    pub name: String,
}

impl Tables {
    pub fn app_info(&self, id: ResourceId) -> Option<AppInfo> {
        self.apps.locate(id).map(|r| AppInfo {
            id,
            name: r.start.name.clone(),
            app_type: r.app_type,
            state: r.state,
            file_path: r.start.file_path.clone(),
            priority: r.start.priority,
            stack_size: r.start.stack_size,
            main_task: r.main_task,
            child_tasks: r.child_tasks,
        })
    }

    pub fn all_app_info(&self) -> alloc::vec::Vec<AppInfo> {
        self.apps
            .iter_used()
            .filter_map(|(id, _)| self.app_info(id))
            .collect()
    }

    pub fn all_task_info(&self) -> alloc::vec::Vec<TaskInfo> {
        self.tasks
            .iter_used()
            .map(|(id, r)| TaskInfo {
                id,
                app_id: r.app_id,
                name: r.name.clone(),
            })
            .collect()
    }
}
