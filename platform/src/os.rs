//! OS primitive interface
//!
//! The executive core drives tasks, loadable modules, and files through
//! `OsApi`. Implementations wrap whatever RTOS the node runs; the fake
//! used by the test suites keeps everything in memory.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::OsResult;

/// Handle to an OS task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(pub u32);

/// Handle to a loaded object module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub u32);

/// Handle to an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u32);

/// Resolved address of a module entry symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolAddr(pub usize);

bitflags::bitflags! {
    /// File open flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const READ     = 1 << 0;
        const WRITE    = 1 << 1;
        const CREATE   = 1 << 2;
        const TRUNCATE = 1 << 3;
        const APPEND   = 1 << 4;
    }
}

/// An OS object owned by a task, as reported by `OsApi::owned_objects`.
///
/// Cleanup walks this list and deletes each entry best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsObject {
    Mutex(u32),
    BinSemaphore(u32),
    CountSemaphore(u32),
    Queue(u32),
    Timer(u32),
    File(FileHandle),
}

impl OsObject {
    /// Human-readable kind label for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            OsObject::Mutex(_) => "mutex",
            OsObject::BinSemaphore(_) => "binary semaphore",
            OsObject::CountSemaphore(_) => "counting semaphore",
            OsObject::Queue(_) => "queue",
            OsObject::Timer(_) => "timer",
            OsObject::File(_) => "file",
        }
    }
}

/// Parameters for task creation.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Task name (also the OS-visible name).
    pub name: String,
    /// Entry symbol to resolve inside `module`.
    pub entry_symbol: String,
    /// Module the entry lives in, if dynamically loaded.
    pub module: Option<ModuleHandle>,
    /// OS priority.
    pub priority: u8,
    /// Stack size in bytes.
    pub stack_size: u32,
}

/// The OS primitives consumed by the executive core.
///
/// Every call returns a success/failure code; the core maps failures to
/// its own error taxonomy and logs them. Implementations are expected to
/// be callable from any task, so methods take `&self`.
pub trait OsApi {
    /// Create and start a task.
    fn create_task(&self, spec: &TaskSpec) -> OsResult<TaskHandle>;

    /// Delete a task.
    fn delete_task(&self, task: TaskHandle) -> OsResult<()>;

    /// Load an object module from a file path.
    fn load_module(&self, path: &str) -> OsResult<ModuleHandle>;

    /// Unload a previously loaded module.
    fn unload_module(&self, module: ModuleHandle) -> OsResult<()>;

    /// Resolve a symbol inside a loaded module.
    fn lookup_symbol(&self, module: ModuleHandle, symbol: &str) -> OsResult<SymbolAddr>;

    /// Invoke a resolved entry once, synchronously (library init).
    fn run_entry(&self, entry: SymbolAddr) -> OsResult<()>;

    /// Open a file.
    fn open(&self, path: &str, flags: OpenFlags) -> OsResult<FileHandle>;

    /// Read from an open file. Returns the number of bytes read; 0 at EOF.
    fn read(&self, file: FileHandle, buf: &mut [u8]) -> OsResult<usize>;

    /// Write to an open file.
    fn write(&self, file: FileHandle, data: &[u8]) -> OsResult<usize>;

    /// Close an open file.
    fn close(&self, file: FileHandle) -> OsResult<()>;

    /// Enumerate the OS objects currently owned by a task.
    fn owned_objects(&self, task: TaskHandle) -> Vec<OsObject>;

    /// Delete one OS object.
    fn delete_object(&self, object: &OsObject) -> OsResult<()>;

    /// Block the calling task for `ms` milliseconds.
    fn delay_ms(&self, ms: u32);

    /// Monotonic millisecond tick, used for timestamps.
    fn ticks_ms(&self) -> u64;
}
