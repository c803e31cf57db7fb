//! Shared in-memory collaborators for the integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use spin::Mutex;

use kestrel_platform::{
    EventId, EventSeverity, EventSink, ExceptionInfo, FileHandle, ModuleHandle, OpenFlags, OsApi,
    OsError, OsResult, PlatformSupport, PspError, PspResult, ResetSubtype, ResetType, SymbolAddr,
    TaskHandle, TaskSpec,
};

#[derive(Default)]
pub struct SystemOs {
    next_id: Mutex<u32>,
    pub tasks: Mutex<HashMap<u32, String>>,
    pub modules: Mutex<HashMap<u32, String>>,
    pub fs: Mutex<HashMap<String, Vec<u8>>>,
    files: Mutex<HashMap<u32, (String, usize, bool)>>,
    time_ms: Mutex<u64>,
}

impl SystemOs {
    pub fn new() -> Arc<SystemOs> {
        let os = SystemOs::default();
        *os.next_id.lock() = 1;
        Arc::new(os)
    }

    pub fn put_file(&self, path: &str, contents: &[u8]) {
        self.fs.lock().insert(path.into(), contents.to_vec());
    }

    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        self.fs.lock().get(path).cloned()
    }

    pub fn task_handle_by_name(&self, name: &str) -> Option<TaskHandle> {
        self.tasks
            .lock()
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(&id, _)| TaskHandle(id))
    }

    fn fresh_id(&self) -> u32 {
        let mut next = self.next_id.lock();
        let id = *next;
        *next += 1;
        id
    }
}

impl OsApi for SystemOs {
    fn create_task(&self, spec: &TaskSpec) -> OsResult<TaskHandle> {
        let id = self.fresh_id();
        self.tasks.lock().insert(id, spec.name.clone());
        Ok(TaskHandle(id))
    }

    fn delete_task(&self, task: TaskHandle) -> OsResult<()> {
        self.tasks
            .lock()
            .remove(&task.0)
            .map(|_| ())
            .ok_or(OsError::NotFound)
    }

    fn load_module(&self, path: &str) -> OsResult<ModuleHandle> {
        let id = self.fresh_id();
        self.modules.lock().insert(id, path.into());
        Ok(ModuleHandle(id))
    }

    fn unload_module(&self, module: ModuleHandle) -> OsResult<()> {
        self.modules
            .lock()
            .remove(&module.0)
            .map(|_| ())
            .ok_or(OsError::NotFound)
    }

    fn lookup_symbol(&self, _module: ModuleHandle, _symbol: &str) -> OsResult<SymbolAddr> {
        Ok(SymbolAddr(0x1000))
    }

    fn run_entry(&self, _entry: SymbolAddr) -> OsResult<()> {
        Ok(())
    }

    fn open(&self, path: &str, flags: OpenFlags) -> OsResult<FileHandle> {
        let writable = flags.contains(OpenFlags::WRITE);
        {
            let mut fs = self.fs.lock();
            if writable {
                if flags.contains(OpenFlags::TRUNCATE) || !fs.contains_key(path) {
                    fs.insert(path.into(), Vec::new());
                }
            } else if !fs.contains_key(path) {
                return Err(OsError::NotFound);
            }
        }
        let id = self.fresh_id();
        self.files.lock().insert(id, (path.into(), 0, writable));
        Ok(FileHandle(id))
    }

    fn read(&self, file: FileHandle, buf: &mut [u8]) -> OsResult<usize> {
        let mut files = self.files.lock();
        let (path, pos, _) = files.get(&file.0).cloned().ok_or(OsError::NotFound)?;
        let fs = self.fs.lock();
        let data = fs.get(&path).ok_or(OsError::Io)?;
        let n = buf.len().min(data.len().saturating_sub(pos));
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        if let Some(state) = files.get_mut(&file.0) {
            state.1 += n;
        }
        Ok(n)
    }

    fn write(&self, file: FileHandle, data: &[u8]) -> OsResult<usize> {
        let files = self.files.lock();
        let (path, _, writable) = files.get(&file.0).cloned().ok_or(OsError::NotFound)?;
        if !writable {
            return Err(OsError::Io);
        }
        self.fs
            .lock()
            .get_mut(&path)
            .ok_or(OsError::Io)?
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn close(&self, file: FileHandle) -> OsResult<()> {
        self.files
            .lock()
            .remove(&file.0)
            .map(|_| ())
            .ok_or(OsError::NotFound)
    }

    fn owned_objects(&self, _task: TaskHandle) -> Vec<kestrel_platform::OsObject> {
        Vec::new()
    }

    fn delete_object(&self, _object: &kestrel_platform::OsObject) -> OsResult<()> {
        Ok(())
    }

    fn delay_ms(&self, ms: u32) {
        *self.time_ms.lock() += ms as u64;
    }

    fn ticks_ms(&self) -> u64 {
        *self.time_ms.lock()
    }
}

pub struct SystemPsp {
    pub nv: Mutex<Vec<u8>>,
    pub reset_area: Mutex<Vec<u8>>,
    pub restarts: Mutex<Vec<ResetType>>,
    pub exceptions: Mutex<VecDeque<ExceptionInfo>>,
    pub cause: Mutex<(ResetType, ResetSubtype)>,
}

impl SystemPsp {
    pub fn new(nv_size: usize) -> Arc<SystemPsp> {
        Arc::new(SystemPsp {
            nv: Mutex::new(vec![0u8; nv_size]),
            reset_area: Mutex::new(Vec::new()),
            restarts: Mutex::new(Vec::new()),
            exceptions: Mutex::new(VecDeque::new()),
            cause: Mutex::new((ResetType::PowerOn, ResetSubtype::PowerCycle)),
        })
    }

    pub fn push_exception(&self, context_id: u32, task: Option<TaskHandle>) {
        self.exceptions.lock().push_back(ExceptionInfo {
            context_id,
            task,
            description: format!("exception context {}", context_id),
        });
    }
}

impl PlatformSupport for SystemPsp {
    fn reset_cause(&self) -> (ResetType, ResetSubtype) {
        *self.cause.lock()
    }

    fn restart(&self, kind: ResetType) {
        self.restarts.lock().push(kind);
    }

    fn panic(&self, _code: u32) {}

    fn exception_count(&self) -> u32 {
        self.exceptions.lock().len() as u32
    }

    fn take_exception(&self) -> Option<ExceptionInfo> {
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

#[derive(Default)]
pub struct SystemEvents {
    pub events: Mutex<Vec<(u16, String)>>,
}

impl SystemEvents {
    pub fn new() -> Arc<SystemEvents> {
        Arc::new(SystemEvents::default())
    }

    pub fn has(&self, id: EventId) -> bool {
        self.events.lock().iter().any(|(e, _)| *e == id.0)
    }
}

impl EventSink for SystemEvents {
    fn emit(&self, id: EventId, _severity: EventSeverity, text: &str) {
        self.events.lock().push((id.0, text.into()));
    }
}
