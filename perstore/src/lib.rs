//! Kestrel Persistent Store (Critical Data Store)
//!
//! Named, power-cycle-surviving storage blocks backed by the platform's
//! non-volatile byte region. The region begins and ends with fixed 8-byte
//! signatures; the body is a chain of self-describing blocks (descriptor +
//! payload) carved by a dedicated persistent allocator, with the registry
//! itself stored as the first block so the whole structure can be
//! reconstructed after a processor reset.
//!
//! Early initialization:
//! 1. A region below the minimum size means the store is absent; the
//!    store still constructs, and operations report `NotImplemented`.
//! 2. Matching signatures trigger a rebuild: the registry block is read
//!    back and the allocator directory is re-derived by walking the
//!    descriptor chain, validating every check pattern on the way.
//! 3. Missing signatures, or any rebuild failure, wipe the region and
//!    initialize it fresh.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod crc;
mod error;
mod pool;

pub use error::{CdsError, CdsResult};

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use hashbrown::HashMap;
use kestrel_platform::{PlatformSupport, SharedLock};
use serde::{Deserialize, Serialize};

use pool::{CdsPool, DESC_SIZE};

// ── Platform limits ─────────────────────────────────────────

/// Region begin signature.
pub const SIGNATURE_BEGIN: [u8; 8] = *b"_CDSBeg_";
/// Region end signature.
pub const SIGNATURE_END: [u8; 8] = *b"_CDSEnd_";

/// Maximum registry entries.
pub const MAX_CDS_ENTRIES: usize = 128;
/// Maximum block name length in bytes.
pub const MAX_CDS_NAME_LEN: usize = 32;

/// Capacity reserved for the encoded registry image (the first block).
const REGISTRY_IMAGE_CAP: u32 = 6144;

/// Smallest usable region; anything below this is treated as absent.
pub const MIN_REGION_SIZE: usize = 16 * 1024;

// ── Types ───────────────────────────────────────────────────

/// Persistent handle to a registered block.
///
/// The value is the block descriptor's offset within the region, so a
/// handle remains valid across a processor reset and rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CdsHandle(pub u32);

impl core::fmt::Display for CdsHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// How early initialization resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Region absent or below minimum; zero capacity.
    Absent,
    /// Region wiped and initialized as new.
    Fresh,
    /// Previous contents recovered by descriptor scan.
    Rebuilt,
}

/// Outcome of a successful `register_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// New storage was allocated for the name.
    Created,
    /// The name was already registered at this size; the existing handle
    /// is returned.
    AlreadyExists,
}

/// Read-only registry entry view, for the dump command surface.
#[derive(Debug, Clone)]
pub struct CdsEntryInfo {
    pub name: String,
    pub table: bool,
    pub size: u32,
    pub handle: CdsHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegEntry {
    name: String,
    table: bool,
    size: u32,
    offset: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryImage {
    entries: Vec<RegEntry>,
}

struct ReadyState {
    pool: CdsPool,
    entries: Vec<RegEntry>,
    name_index: HashMap<String, usize>,
    registry_offset: u32,
}

enum StoreState {
    Absent,
    Ready(ReadyState),
}

// ── Store ───────────────────────────────────────────────────

/// The critical data store.
///
/// Registry mutation is serialized by the store's own lock, separate from
/// any allocator lock; the pool instance inside is created lock-free for
/// exactly that reason.
pub struct CdsStore {
    psp: Arc<dyn PlatformSupport>,
    state: SharedLock<StoreState>,
    outcome: InitOutcome,
}

impl CdsStore {
    /// Run early initialization against the platform's non-volatile
    /// region and construct the store.
    pub fn init(psp: Arc<dyn PlatformSupport>) -> CdsResult<CdsStore> {
        let size = psp.nonvolatile_size();
        if size < MIN_REGION_SIZE {
            log::info!(
                "[cds] non-volatile region too small ({} bytes), store absent",
                size
            );
            return Ok(CdsStore {
                psp,
                state: SharedLock::new("cds-registry", StoreState::Absent),
                outcome: InitOutcome::Absent,
            });
        }

        let (ready, outcome) = match Self::try_rebuild(psp.as_ref(), size) {
            Ok(ready) => {
                log::info!(
                    "[cds] rebuilt store: {} entries, {} free bytes",
                    ready.entries.len(),
                    ready.pool.free_bytes()
                );
                (ready, InitOutcome::Rebuilt)
            }
            Err(err) => {
                log::warn!("[cds] cannot recover region ({}), initializing fresh", err);
                (Self::init_fresh(psp.as_ref(), size)?, InitOutcome::Fresh)
            }
        };
        Ok(CdsStore {
            psp,
            state: SharedLock::new("cds-registry", StoreState::Ready(ready)),
            outcome,
        })
    }

    /// How this store's early initialization resolved.
    pub fn outcome(&self) -> InitOutcome {
        self.outcome
    }

    /// Whether a usable region is behind this store.
    pub fn is_present(&self) -> bool {
        self.outcome != InitOutcome::Absent
    }

    /// Register (or retrieve) a named block.
    ///
    /// Re-registering an existing name at the same size retrieves the
    /// existing handle; a different size allocates fresh storage for the
    /// same name.
    pub fn register_block(
        &self,
        name: &str,
        size: u32,
        is_table: bool,
    ) -> CdsResult<(CdsHandle, RegisterOutcome)> {
        let psp = self.psp.as_ref();
        self.state.with(|st| {
            let ready = match st {
                StoreState::Absent => return Err(CdsError::NotImplemented),
                StoreState::Ready(r) => r,
            };
            if name.is_empty() || name.len() > MAX_CDS_NAME_LEN {
                return Err(CdsError::InvalidName);
            }
            if size == 0 {
                return Err(CdsError::InvalidSize);
            }

            if let Some(&idx) = ready.name_index.get(name) {
                let (old_offset, old_size) = {
                    let entry = &ready.entries[idx];
                    (entry.offset, entry.size)
                };
                if old_size == size {
                    return Ok((CdsHandle(old_offset), RegisterOutcome::AlreadyExists));
                }
                // Same name, new size: allocate first so a failed
                // allocation leaves the existing block intact.
                let new_offset = ready.pool.allocate(psp, size)?;
                ready.pool.free(psp, old_offset)?;
                ready.entries[idx].offset = new_offset;
                ready.entries[idx].size = size;
                Self::persist_registry(ready, psp)?;
                return Ok((CdsHandle(new_offset), RegisterOutcome::Created));
            }

            if ready.entries.len() >= MAX_CDS_ENTRIES {
                return Err(CdsError::RegistryFull);
            }
            let offset = ready.pool.allocate(psp, size)?;
            ready.entries.push(RegEntry {
                name: String::from(name),
                table: is_table,
                size,
                offset,
            });
            ready
                .name_index
                .insert(String::from(name), ready.entries.len() - 1);
            Self::persist_registry(ready, psp)?;
            Ok((CdsHandle(offset), RegisterOutcome::Created))
        })
    }

    /// Write a block's payload together with a fresh CRC.
    pub fn copy_to_store(&self, handle: CdsHandle, data: &[u8]) -> CdsResult<()> {
        let psp = self.psp.as_ref();
        self.state.with(|st| {
            let ready = match st {
                StoreState::Absent => return Err(CdsError::NotImplemented),
                StoreState::Ready(r) => r,
            };
            let mut desc = ready.pool.read_desc(psp, handle.0)?;
            if desc.state != pool::BLOCK_USED {
                return Err(CdsError::InvalidHandle);
            }
            if data.len() as u32 != desc.size_used {
                return Err(CdsError::InvalidSize);
            }
            psp.nonvolatile_write((handle.0 + DESC_SIZE) as usize, data)
                .map_err(CdsError::NvIo)?;
            desc.crc = crc::checksum(data);
            ready.pool.write_desc(psp, handle.0, &desc)
        })
    }

    /// Read a block's payload, validating it against the stored CRC.
    pub fn copy_from_store(&self, handle: CdsHandle) -> CdsResult<Vec<u8>> {
        let psp = self.psp.as_ref();
        self.state.with(|st| {
            let ready = match st {
                StoreState::Absent => return Err(CdsError::NotImplemented),
                StoreState::Ready(r) => r,
            };
            let desc = ready.pool.read_desc(psp, handle.0)?;
            if desc.state != pool::BLOCK_USED {
                return Err(CdsError::InvalidHandle);
            }
            let mut data = alloc::vec![0u8; desc.size_used as usize];
            psp.nonvolatile_read((handle.0 + DESC_SIZE) as usize, &mut data)
                .map_err(CdsError::NvIo)?;
            if crc::checksum(&data) != desc.crc {
                log::error!("[cds] CRC mismatch reading block {}", handle);
                return Err(CdsError::CrcMismatch);
            }
            Ok(data)
        })
    }

    /// Delete a named block.
    ///
    /// `owner_active` reports whether an application name is currently
    /// registered and running; the owner is the portion of the block name
    /// before the first `.`, compared exactly.
    pub fn delete_block(
        &self,
        name: &str,
        is_table: bool,
        owner_active: &dyn Fn(&str) -> bool,
    ) -> CdsResult<()> {
        let psp = self.psp.as_ref();
        self.state.with(|st| {
            let ready = match st {
                StoreState::Absent => return Err(CdsError::NotImplemented),
                StoreState::Ready(r) => r,
            };
            let idx = *ready.name_index.get(name).ok_or(CdsError::NotFound)?;
            if ready.entries[idx].table != is_table {
                return Err(CdsError::WrongType);
            }
            let owner = name.split('.').next().unwrap_or(name);
            if owner_active(owner) {
                return Err(CdsError::OwnerActive);
            }
            let offset = ready.entries[idx].offset;
            ready.pool.free(psp, offset)?;
            ready.entries.remove(idx);
            ready.name_index.clear();
            for (i, entry) in ready.entries.iter().enumerate() {
                ready.name_index.insert(entry.name.clone(), i);
            }
            Self::persist_registry(ready, psp)
        })
    }

    /// Look up a registered block's handle by name.
    pub fn lookup(&self, name: &str) -> CdsResult<CdsHandle> {
        self.state.with(|st| match st {
            StoreState::Absent => Err(CdsError::NotImplemented),
            StoreState::Ready(ready) => ready
                .name_index
                .get(name)
                .map(|&idx| CdsHandle(ready.entries[idx].offset))
                .ok_or(CdsError::NotFound),
        })
    }

    /// Snapshot of the registry, for the dump command.
    pub fn registry_snapshot(&self) -> Vec<CdsEntryInfo> {
        self.state.with(|st| match st {
            StoreState::Absent => Vec::new(),
            StoreState::Ready(ready) => ready
                .entries
                .iter()
                .map(|e| CdsEntryInfo {
                    name: e.name.clone(),
                    table: e.table,
                    size: e.size,
                    handle: CdsHandle(e.offset),
                })
                .collect(),
        })
    }

    // ── Early-init internals ────────────────────────────────

    fn try_rebuild(psp: &dyn PlatformSupport, size: usize) -> CdsResult<ReadyState> {
        let mut begin = [0u8; 8];
        let mut end = [0u8; 8];
        psp.nonvolatile_read(0, &mut begin).map_err(CdsError::NvIo)?;
        psp.nonvolatile_read(size - 8, &mut end)
            .map_err(CdsError::NvIo)?;
        if begin != SIGNATURE_BEGIN || end != SIGNATURE_END {
            return Err(CdsError::Unformatted);
        }

        let pool_start = 8u32;
        let pool_end = (size - 8) as u32;
        let pool = CdsPool::rebuild(
            psp,
            kestrel_mempool::DEFAULT_BLOCK_CLASSES.to_vec(),
            pool_start,
            pool_end,
        )?;

        // The registry is always the first block in the chain.
        let reg_desc = pool.read_desc(psp, pool_start)?;
        if reg_desc.state != pool::BLOCK_USED {
            return Err(CdsError::Corrupt);
        }
        let mut image_buf = alloc::vec![0u8; reg_desc.size_used as usize];
        psp.nonvolatile_read((pool_start + DESC_SIZE) as usize, &mut image_buf)
            .map_err(CdsError::NvIo)?;
        if crc::checksum(&image_buf) != reg_desc.crc {
            return Err(CdsError::CrcMismatch);
        }
        let image: RegistryImage =
            postcard::from_bytes(&image_buf).map_err(|_| CdsError::Corrupt)?;
        if image.entries.len() > MAX_CDS_ENTRIES {
            return Err(CdsError::Corrupt);
        }
        // Every registered block must resolve to a live descriptor.
        for entry in &image.entries {
            let desc = pool.read_desc(psp, entry.offset)?;
            if desc.state != pool::BLOCK_USED {
                return Err(CdsError::Corrupt);
            }
        }

        let mut name_index = HashMap::new();
        for (i, entry) in image.entries.iter().enumerate() {
            name_index.insert(entry.name.clone(), i);
        }
        Ok(ReadyState {
            pool,
            entries: image.entries,
            name_index,
            registry_offset: pool_start,
        })
    }

    fn init_fresh(psp: &dyn PlatformSupport, size: usize) -> CdsResult<ReadyState> {
        // Wipe, then lay down signatures and the empty registry.
        let zeros = [0u8; 256];
        let mut offset = 0usize;
        while offset < size {
            let chunk = core::cmp::min(zeros.len(), size - offset);
            psp.nonvolatile_write(offset, &zeros[..chunk])
                .map_err(CdsError::NvIo)?;
            offset += chunk;
        }
        psp.nonvolatile_write(0, &SIGNATURE_BEGIN)
            .map_err(CdsError::NvIo)?;
        psp.nonvolatile_write(size - 8, &SIGNATURE_END)
            .map_err(CdsError::NvIo)?;

        let mut pool = CdsPool::new(
            kestrel_mempool::DEFAULT_BLOCK_CLASSES.to_vec(),
            8,
            (size - 8) as u32,
        );
        let registry_offset = pool.allocate(psp, REGISTRY_IMAGE_CAP)?;
        let mut ready = ReadyState {
            pool,
            entries: Vec::new(),
            name_index: HashMap::new(),
            registry_offset,
        };
        Self::persist_registry(&mut ready, psp)?;
        log::info!(
            "[cds] initialized fresh store, {} free bytes",
            ready.pool.free_bytes()
        );
        Ok(ready)
    }

    fn persist_registry(ready: &mut ReadyState, psp: &dyn PlatformSupport) -> CdsResult<()> {
        let image = RegistryImage {
            entries: ready.entries.clone(),
        };
        let encoded = postcard::to_allocvec(&image).map_err(|_| CdsError::Corrupt)?;
        if encoded.len() as u32 > REGISTRY_IMAGE_CAP {
            return Err(CdsError::RegistryFull);
        }
        let mut buf = alloc::vec![0u8; REGISTRY_IMAGE_CAP as usize];
        buf[..encoded.len()].copy_from_slice(&encoded);

        let mut desc = ready.pool.read_desc(psp, ready.registry_offset)?;
        psp.nonvolatile_write((ready.registry_offset + DESC_SIZE) as usize, &buf)
            .map_err(CdsError::NvIo)?;
        desc.crc = crc::checksum(&buf);
        desc.size_used = REGISTRY_IMAGE_CAP;
        ready.pool.write_desc(psp, ready.registry_offset, &desc)
    }
}

// ── Tests ───────────────────────────────────────────────────
