//! Kestrel Memory Pool
//!
//! General-purpose block allocator used throughout the system. A pool
//! carves a single caller-supplied buffer into blocks rounded up to one of
//! a small set of configured size classes. Block metadata lives in a side
//! table keyed by opaque handles, never inside the pooled memory itself,
//! so a buggy or hostile writer cannot forge allocator state. Every
//! descriptor carries a check pattern distinguishing allocated, free, and
//! corrupt; a lookup that fails the pattern is a fatal handle error for
//! that operation, never a partial success.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use spin::Mutex;

// ── Constants ───────────────────────────────────────────────

/// Maximum number of size classes a pool may be configured with.
pub const MAX_BLOCK_CLASSES: usize = 16;

/// Built-in size classes, used when the creator supplies none.
pub const DEFAULT_BLOCK_CLASSES: [u32; MAX_BLOCK_CLASSES] = [
    8, 16, 32, 48, 64, 96, 128, 160, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768,
];

/// Per-block accounting overhead, charged against pool capacity for each
/// carved block alongside its class size.
pub const BLOCK_OVERHEAD: u32 = 16;

/// Check pattern stamped into every live descriptor.
const CHECK_PATTERN: u16 = 0x5A5A;
/// Allocated-state flag value.
const BLOCK_ALLOCATED: u16 = 0xAAAA;
/// Free-state flag value.
const BLOCK_FREE: u16 = 0xDDDD;

// ── Types ───────────────────────────────────────────────────

/// Opaque handle to an allocated (or freed-and-not-yet-reused) block.
///
/// Encodes a side-table slot plus a generation stamp; a handle from a
/// previous allocation round never aliases a newer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHandle(u32);

impl BlockHandle {
    fn new(slot: u16, generation: u16) -> Self {
        BlockHandle(((generation as u32) << 16) | slot as u32)
    }

    /// Raw handle value, for diagnostics and telemetry.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Pool locking selector.
///
/// `Mutex` pools are safe to share between tasks. `None` declares a
/// single-owner pool whose caller serializes access itself, such as the
/// persistent store's allocator under its own coarser lock; the
/// descriptor table's spin lock is then uncontended by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolLocking {
    Mutex,
    None,
}

impl PoolLocking {
    /// Decode the on-wire selector. Exactly two values are recognized.
    pub fn from_raw(raw: u16) -> Option<PoolLocking> {
        match raw {
            0 => Some(PoolLocking::None),
            1 => Some(PoolLocking::Mutex),
            _ => None,
        }
    }
}

/// Pool operation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Create was given an unusable buffer or class configuration.
    BadArgument,
    /// No configured class can satisfy the request, or the pool is out
    /// of space.
    BlockSize,
    /// Handle failed validation: stale, wrong state, or corrupt pattern.
    InvalidHandle,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::BadArgument => write!(f, "bad argument"),
            PoolError::BlockSize => write!(f, "no suitable block size"),
            PoolError::InvalidHandle => write!(f, "invalid block handle"),
        }
    }
}

/// Read-only information about one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    /// Size the caller asked for.
    pub requested: u32,
    /// Size class the block was rounded to.
    pub class_size: u32,
}

/// Per-class statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassStats {
    /// Configured class size in bytes.
    pub block_size: u32,
    /// Blocks of this class ever carved from the buffer.
    pub num_created: u32,
    /// Blocks of this class currently on the free list.
    pub num_free: u32,
}

/// Pool-wide statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Total buffer size the pool was created over.
    pub pool_size: u32,
    /// Allocations granted over the pool's lifetime.
    pub num_granted: u32,
    /// Handle-validation failures observed.
    pub check_err_count: u32,
    /// Bytes of the buffer not yet carved into blocks.
    pub free_bytes: u32,
    /// Per-class counters, one entry per configured class.
    pub classes: Vec<ClassStats>,
}

// ── Descriptor side table ───────────────────────────────────

/// Block descriptor. Lives in the side table, never in pooled memory.
#[derive(Debug, Clone)]
struct BlockDesc {
    check: u16,
    state: u16,
    class_idx: usize,
    requested: u32,
    /// Byte offset of the block payload within the pool buffer.
    offset: u32,
}

struct PoolInner {
    buffer: Vec<u8>,
    classes: Vec<u32>,
    /// Next un-carved byte offset.
    cursor: u32,
    /// handle-raw → descriptor.
    descriptors: HashMap<u32, BlockDesc>,
    /// Free handles per class.
    free_lists: Vec<Vec<BlockHandle>>,
    next_slot: u16,
    next_generation: u16,
    num_granted: u32,
    check_err_count: u32,
    created: Vec<u32>,
}

impl PoolInner {
    fn free_bytes(&self) -> u32 {
        self.buffer.len() as u32 - self.cursor
    }

    fn class_for(&self, size: u32) -> Option<usize> {
        self.classes.iter().position(|&c| c >= size)
    }

    fn fresh_handle(&mut self) -> BlockHandle {
        let slot = self.next_slot;
        self.next_slot = self.next_slot.wrapping_add(1);
        self.next_generation = self.next_generation.wrapping_add(1);
        BlockHandle::new(slot, self.next_generation)
    }

    fn allocate(&mut self, size: u32) -> Result<BlockHandle, PoolError> {
        if size == 0 {
            return Err(PoolError::BadArgument);
        }
        let class_idx = self.class_for(size).ok_or(PoolError::BlockSize)?;

        // Reuse a freed block of the same class when one is available.
        // The recycled block is re-keyed under a fresh generation so the
        // old handle can never alias the new allocation.
        if let Some(old) = self.free_lists[class_idx].pop() {
            let mut desc = self
                .descriptors
                .remove(&old.as_u32())
                .ok_or(PoolError::InvalidHandle)?;
            desc.state = BLOCK_ALLOCATED;
            desc.requested = size;
            let handle = self.fresh_handle();
            self.descriptors.insert(handle.as_u32(), desc);
            self.num_granted += 1;
            return Ok(handle);
        }

        // Carve a fresh block from the remaining buffer.
        let class_size = self.classes[class_idx];
        if class_size + BLOCK_OVERHEAD > self.free_bytes() {
            return Err(PoolError::BlockSize);
        }
        let offset = self.cursor;
        self.cursor += class_size + BLOCK_OVERHEAD;

        let handle = self.fresh_handle();
        self.descriptors.insert(
            handle.as_u32(),
            BlockDesc {
                check: CHECK_PATTERN,
                state: BLOCK_ALLOCATED,
                class_idx,
                requested: size,
                offset,
            },
        );
        self.created[class_idx] += 1;
        self.num_granted += 1;
        Ok(handle)
    }

    /// Look up a descriptor, enforcing the check pattern and the
    /// allocated state. Any failure counts against `check_err_count`.
    fn validate(&mut self, handle: BlockHandle) -> Result<(), PoolError> {
        let ok = match self.descriptors.get(&handle.as_u32()) {
            Some(desc) => desc.check == CHECK_PATTERN && desc.state == BLOCK_ALLOCATED,
            None => false,
        };
        if !ok {
            self.check_err_count += 1;
            log::error!("[pool] handle validation failed: {}", handle);
            return Err(PoolError::InvalidHandle);
        }
        Ok(())
    }

    fn release(&mut self, handle: BlockHandle) -> Result<(), PoolError> {
        self.validate(handle)?;
        let class_idx = {
            let desc = self
                .descriptors
                .get_mut(&handle.as_u32())
                .ok_or(PoolError::InvalidHandle)?;
            desc.state = BLOCK_FREE;
            desc.class_idx
        };
        self.free_lists[class_idx].push(handle);
        Ok(())
    }

    fn buffer_info(&mut self, handle: BlockHandle) -> Result<BufferInfo, PoolError> {
        self.validate(handle)?;
        let desc = &self.descriptors[&handle.as_u32()];
        Ok(BufferInfo {
            requested: desc.requested,
            class_size: self.classes[desc.class_idx],
        })
    }

    fn copy_in(&mut self, handle: BlockHandle, data: &[u8]) -> Result<(), PoolError> {
        self.validate(handle)?;
        let desc = &self.descriptors[&handle.as_u32()];
        if data.len() as u32 > self.classes[desc.class_idx] {
            return Err(PoolError::BlockSize);
        }
        let start = desc.offset as usize;
        self.buffer[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn copy_out(&mut self, handle: BlockHandle, out: &mut [u8]) -> Result<(), PoolError> {
        self.validate(handle)?;
        let desc = &self.descriptors[&handle.as_u32()];
        if out.len() as u32 > self.classes[desc.class_idx] {
            return Err(PoolError::BlockSize);
        }
        let start = desc.offset as usize;
        out.copy_from_slice(&self.buffer[start..start + out.len()]);
        Ok(())
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            pool_size: self.buffer.len() as u32,
            num_granted: self.num_granted,
            check_err_count: self.check_err_count,
            free_bytes: self.free_bytes(),
            classes: self
                .classes
                .iter()
                .enumerate()
                .map(|(i, &size)| ClassStats {
                    block_size: size,
                    num_created: self.created[i],
                    num_free: self.free_lists[i].len() as u32,
                })
                .collect(),
        }
    }
}

// ── Pool ────────────────────────────────────────────────────

/// A block pool over one contiguous buffer.
pub struct Pool {
    inner: Mutex<PoolInner>,
    locking: PoolLocking,
}

impl Pool {
    /// Create a pool over `buffer`, optionally with custom size classes.
    ///
    /// Fails with `BadArgument` if the buffer cannot hold one descriptor
    /// plus the smallest class, or if more than `MAX_BLOCK_CLASSES` classes
    /// are requested. Classes are sorted ascending and deduplicated.
    pub fn create(
        buffer: Vec<u8>,
        classes: Option<&[u32]>,
        locking: PoolLocking,
    ) -> Result<Pool, PoolError> {
        let mut classes: Vec<u32> = match classes {
            Some(c) => {
                if c.len() > MAX_BLOCK_CLASSES || c.is_empty() || c.contains(&0) {
                    return Err(PoolError::BadArgument);
                }
                c.to_vec()
            }
            None => DEFAULT_BLOCK_CLASSES.to_vec(),
        };
        classes.sort_unstable();
        classes.dedup();

        let min_viable = classes[0] + BLOCK_OVERHEAD;
        if (buffer.len() as u32) < min_viable {
            return Err(PoolError::BadArgument);
        }

        let n = classes.len();
        Ok(Pool {
            inner: Mutex::new(PoolInner {
                buffer,
                classes,
                cursor: 0,
                descriptors: HashMap::new(),
                free_lists: (0..n).map(|_| Vec::new()).collect(),
                next_slot: 0,
                next_generation: 0,
                num_granted: 0,
                check_err_count: 0,
                created: alloc::vec![0; n],
            }),
            locking,
        })
    }

    /// Which locking mode this pool was created with.
    pub fn locking(&self) -> PoolLocking {
        self.locking
    }

    /// Allocate a block of at least `size` bytes, rounded up to the
    /// smallest configured class.
    pub fn allocate(&self, size: u32) -> Result<BlockHandle, PoolError> {
        self.inner.lock().allocate(size)
    }

    /// Return a block to its class free list.
    pub fn free(&self, handle: BlockHandle) -> Result<(), PoolError> {
        self.inner.lock().release(handle)
    }

    /// Read-only descriptor information for an allocated block.
    pub fn buffer_info(&self, handle: BlockHandle) -> Result<BufferInfo, PoolError> {
        self.inner.lock().buffer_info(handle)
    }

    /// Copy bytes into an allocated block.
    pub fn copy_in(&self, handle: BlockHandle, data: &[u8]) -> Result<(), PoolError> {
        self.inner.lock().copy_in(handle, data)
    }

    /// Copy bytes out of an allocated block.
    pub fn copy_out(&self, handle: BlockHandle, out: &mut [u8]) -> Result<(), PoolError> {
        self.inner.lock().copy_out(handle, out)
    }

    /// Snapshot pool statistics.
    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats()
    }
}

// ── Size class helpers (shared with the persistent store) ───

/// Smallest class in `classes` (ascending) that can hold `size`.
pub fn class_for(classes: &[u32], size: u32) -> Option<usize> {
    classes.iter().position(|&c| c >= size)
}

// ── Tests ───────────────────────────────────────────────────
