//! In-memory test doubles for the collaborator interfaces.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};
use spin::Mutex;

use kestrel_platform::{
    EventId, EventSeverity, EventSink, ExceptionInfo, FileHandle, ModuleHandle, OpenFlags, OsApi,
    OsError, OsResult, PlatformSupport, PspError, PspResult, ResetSubtype, ResetType, SymbolAddr,
    TaskHandle, TaskSpec,
};

use crate::apps::{ExceptionAction, StartParams};
use crate::state::Executive;

// ── Fake OS ─────────────────────────────────────────────────

#[derive(Default)]
pub struct OsInner {
    next_id: u32,
    pub tasks: HashMap<u32, String>,
    pub modules: HashSet<u32>,
    files: HashMap<u32, FileState>,
    pub fs: HashMap<String, Vec<u8>>,
    pub owned: HashMap<u32, Vec<kestrel_platform::OsObject>>,
    pub fail_create_task: bool,
    pub fail_delete_object: bool,
    pub fail_load: HashSet<String>,
    pub missing_symbols: HashSet<String>,
    pub time_ms: u64,
}

struct FileState {
    path: String,
    pos: usize,
    writable: bool,
}

pub struct FakeOs {
    pub inner: Mutex<OsInner>,
}

impl FakeOs {
    pub fn new() -> Arc<FakeOs> {
        Arc::new(FakeOs {
            inner: Mutex::new(OsInner {
                next_id: 1,
                ..OsInner::default()
            }),
        })
    }

    /// Seed a file into the fake filesystem.
    pub fn put_file(&self, path: &str, contents: &[u8]) {
        self.inner.lock().fs.insert(String::from(path), contents.to_vec());
    }

    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.lock().fs.get(path).cloned()
    }

    pub fn task_handle_by_name(&self, name: &str) -> Option<TaskHandle> {
        self.inner
            .lock()
            .tasks
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(&id, _)| TaskHandle(id))
    }

    pub fn task_count(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn module_count(&self) -> usize {
        self.inner.lock().modules.len()
    }
}

impl OsApi for FakeOs {
    fn create_task(&self, spec: &TaskSpec) -> OsResult<TaskHandle> {
        let mut inner = self.inner.lock();
        if inner.fail_create_task {
            return Err(OsError::Failed);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.tasks.insert(id, spec.name.clone());
        Ok(TaskHandle(id))
    }

    fn delete_task(&self, task: TaskHandle) -> OsResult<()> {
        self.inner
            .lock()
            .tasks
            .remove(&task.0)
            .map(|_| ())
            .ok_or(OsError::NotFound)
    }

    fn load_module(&self, path: &str) -> OsResult<ModuleHandle> {
        let mut inner = self.inner.lock();
        if inner.fail_load.contains(path) {
            return Err(OsError::NotFound);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.modules.insert(id);
        Ok(ModuleHandle(id))
    }

    fn unload_module(&self, module: ModuleHandle) -> OsResult<()> {
        if self.inner.lock().modules.remove(&module.0) {
            Ok(())
        } else {
            Err(OsError::NotFound)
        }
    }

    fn lookup_symbol(&self, _module: ModuleHandle, symbol: &str) -> OsResult<SymbolAddr> {
        if self.inner.lock().missing_symbols.contains(symbol) {
            return Err(OsError::NotFound);
        }
        Ok(SymbolAddr(0x1000))
    }

    fn run_entry(&self, _entry: SymbolAddr) -> OsResult<()> {
        Ok(())
    }

    fn open(&self, path: &str, flags: OpenFlags) -> OsResult<FileHandle> {
        let mut inner = self.inner.lock();
        let writable = flags.contains(OpenFlags::WRITE);
        if writable {
            if flags.contains(OpenFlags::TRUNCATE) || !inner.fs.contains_key(path) {
                inner.fs.insert(String::from(path), Vec::new());
            }
        } else if !inner.fs.contains_key(path) {
            return Err(OsError::NotFound);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.files.insert(
            id,
            FileState {
                path: String::from(path),
                pos: 0,
                writable,
            },
        );
        Ok(FileHandle(id))
    }

    fn read(&self, file: FileHandle, buf: &mut [u8]) -> OsResult<usize> {
        let mut inner = self.inner.lock();
        let state = inner.files.get(&file.0).ok_or(OsError::NotFound)?;
        let path = state.path.clone();
        let pos = state.pos;
        let data = inner.fs.get(&path).ok_or(OsError::Io)?;
        let n = core::cmp::min(buf.len(), data.len().saturating_sub(pos));
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        if let Some(state) = inner.files.get_mut(&file.0) {
            state.pos += n;
        }
        Ok(n)
    }

    fn write(&self, file: FileHandle, data: &[u8]) -> OsResult<usize> {
        let mut inner = self.inner.lock();
        let state = inner.files.get(&file.0).ok_or(OsError::NotFound)?;
        if !state.writable {
            return Err(OsError::Io);
        }
        let path = state.path.clone();
        inner
            .fs
            .get_mut(&path)
            .ok_or(OsError::Io)?
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn close(&self, file: FileHandle) -> OsResult<()> {
        self.inner
            .lock()
            .files
            .remove(&file.0)
            .map(|_| ())
            .ok_or(OsError::NotFound)
    }

    fn owned_objects(&self, task: TaskHandle) -> Vec<kestrel_platform::OsObject> {
        self.inner
            .lock()
            .owned
            .get(&task.0)
            .cloned()
            .unwrap_or_default()
    }

    fn delete_object(&self, _object: &kestrel_platform::OsObject) -> OsResult<()> {
        if self.inner.lock().fail_delete_object {
            Err(OsError::Failed)
        } else {
            Ok(())
        }
    }

    fn delay_ms(&self, ms: u32) {
        self.inner.lock().time_ms += ms as u64;
    }

    fn ticks_ms(&self) -> u64 {
        self.inner.lock().time_ms
    }
}

// ── Fake platform support ───────────────────────────────────

pub struct FakePsp {
    pub nv: Mutex<Vec<u8>>,
    pub reset_area: Mutex<Vec<u8>>,
    pub restarts: Mutex<Vec<ResetType>>,
    pub panics: Mutex<Vec<u32>>,
    pub exceptions: Mutex<VecDeque<ExceptionInfo>>,
    pub cause: Mutex<(ResetType, ResetSubtype)>,
    /// When set, `exception_count` reports one pending exception but the
    /// summary is unavailable.
    pub summary_unavailable: Mutex<bool>,
}

impl FakePsp {
    pub fn new(nv_size: usize) -> Arc<FakePsp> {
        Arc::new(FakePsp {
            nv: Mutex::new(alloc::vec![0u8; nv_size]),
            reset_area: Mutex::new(Vec::new()),
            restarts: Mutex::new(Vec::new()),
            panics: Mutex::new(Vec::new()),
            exceptions: Mutex::new(VecDeque::new()),
            cause: Mutex::new((ResetType::PowerOn, ResetSubtype::PowerCycle)),
            summary_unavailable: Mutex::new(false),
        })
    }

    pub fn push_exception(&self, context_id: u32, task: Option<TaskHandle>) {
        self.exceptions.lock().push_back(ExceptionInfo {
            context_id,
            task,
            description: alloc::format!("exception context {}", context_id),
        });
    }

    pub fn set_cause(&self, kind: ResetType, subtype: ResetSubtype) {
        *self.cause.lock() = (kind, subtype);
    }

    pub fn restart_requests(&self) -> Vec<ResetType> {
        self.restarts.lock().clone()
    }
}

impl PlatformSupport for FakePsp {
    fn reset_cause(&self) -> (ResetType, ResetSubtype) {
        *self.cause.lock()
    }

    fn restart(&self, kind: ResetType) {
        self.restarts.lock().push(kind);
    }

    fn panic(&self, code: u32) {
        self.panics.lock().push(code);
    }

    fn exception_count(&self) -> u32 {
        if *self.summary_unavailable.lock() {
            return 1;
        }
        self.exceptions.lock().len() as u32
    }

    fn take_exception(&self) -> Option<ExceptionInfo> {
        if *self.summary_unavailable.lock() {
            return None;
        }
        self.exceptions.lock().pop_front()
    }

    fn nonvolatile_size(&self) -> usize {
        self.nv.lock().len()
    }

    fn nonvolatile_read(&self, offset: usize, buf: &mut [u8]) -> PspResult<()> {
        let nv = self.nv.lock();
        if offset + buf.len() > nv.len() {
            return Err(PspError::OutOfRange);
        }
        buf.copy_from_slice(&nv[offset..offset + buf.len()]);
        Ok(())
    }

    fn nonvolatile_write(&self, offset: usize, data: &[u8]) -> PspResult<()> {
        let mut nv = self.nv.lock();
        if offset + data.len() > nv.len() {
            return Err(PspError::OutOfRange);
        }
        nv[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn reset_area_load(&self) -> PspResult<Vec<u8>> {
        Ok(self.reset_area.lock().clone())
    }

    fn reset_area_store(&self, image: &[u8]) -> PspResult<()> {
        *self.reset_area.lock() = image.to_vec();
        Ok(())
    }
}

// ── Fake event sink ─────────────────────────────────────────

#[derive(Default)]
pub struct FakeEvents {
    pub events: Mutex<Vec<(u16, EventSeverity, String)>>,
}

impl FakeEvents {
    pub fn new() -> Arc<FakeEvents> {
        Arc::new(FakeEvents::default())
    }

    pub fn has(&self, id: EventId) -> bool {
        self.events.lock().iter().any(|(e, _, _)| *e == id.0)
    }

    pub fn count(&self, id: EventId) -> usize {
        self.events.lock().iter().filter(|(e, _, _)| *e == id.0).count()
    }

    pub fn texts(&self, id: EventId) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(e, _, _)| *e == id.0)
            .map(|(_, _, t)| t.clone())
            .collect()
    }
}

impl EventSink for FakeEvents {
    fn emit(&self, id: EventId, severity: EventSeverity, text: &str) {
        self.events.lock().push((id.0, severity, String::from(text)));
    }
}

// ── Harness ─────────────────────────────────────────────────

pub struct Harness {
    pub exec: Executive,
    pub os: Arc<FakeOs>,
    pub psp: Arc<FakePsp>,
    pub events: Arc<FakeEvents>,
}

/// Executive over fresh fakes. `nv_size` of zero leaves the persistent
/// store absent.
pub fn harness(nv_size: usize) -> Harness {
    let os = FakeOs::new();
    let psp = FakePsp::new(nv_size);
    let events = FakeEvents::new();
    let exec = Executive::new(os.clone(), psp.clone(), events.clone()).unwrap();
    Harness {
        exec,
        os,
        psp,
        events,
    }
}

/// External-application start parameters used across the tests.
pub fn params(name: &str) -> StartParams {
    StartParams {
        file_path: alloc::format!("/ld/{}.so", name.to_lowercase()),
        entry_symbol: alloc::format!("{}_main", name.to_lowercase()),
        name: String::from(name),
        priority: 70,
        stack_size: 4096,
        exception_action: ExceptionAction::RestartApp,
    }
}
