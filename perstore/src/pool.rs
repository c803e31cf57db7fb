//! Persistent block allocator
//!
//! The store's dedicated allocator instance. Unlike the general-purpose
//! pool, block descriptors are written into the non-volatile region
//! directly ahead of their payloads, so the allocator's metadata survives
//! a processor reset without a separate volatile directory. The volatile
//! directory (cursor, chain tail, classed free lists) is cheap state that
//! `rebuild` reconstructs by walking the descriptor chain.

use alloc::vec::Vec;

use kestrel_platform::PlatformSupport;

use crate::error::CdsError;

/// Check pattern stamped into every descriptor.
pub const CHECK_PATTERN: u16 = 0x5A5A;
/// Allocated-state flag value.
pub const BLOCK_USED: u16 = 0xAAAA;
/// Free-state flag value.
pub const BLOCK_UNUSED: u16 = 0xDDDD;

/// On-media descriptor size in bytes.
pub const DESC_SIZE: u32 = 20;

/// Block descriptor, as stored ahead of each payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDesc {
    pub check: u16,
    pub state: u16,
    /// Size the owner registered.
    pub size_used: u32,
    /// Size class the block occupies.
    pub actual_size: u32,
    /// CRC of the payload (first `size_used` bytes).
    pub crc: u16,
    /// Offset of the next descriptor in the chain; 0 terminates.
    pub next: u32,
}

impl BlockDesc {
    pub fn encode(&self) -> [u8; DESC_SIZE as usize] {
        let mut buf = [0u8; DESC_SIZE as usize];
        buf[0..2].copy_from_slice(&self.check.to_le_bytes());
        buf[2..4].copy_from_slice(&self.state.to_le_bytes());
        buf[4..8].copy_from_slice(&self.size_used.to_le_bytes());
        buf[8..12].copy_from_slice(&self.actual_size.to_le_bytes());
        buf[12..14].copy_from_slice(&self.crc.to_le_bytes());
        // bytes 14..16 reserved
        buf[16..20].copy_from_slice(&self.next.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; DESC_SIZE as usize]) -> BlockDesc {
        BlockDesc {
            check: u16::from_le_bytes([buf[0], buf[1]]),
            state: u16::from_le_bytes([buf[2], buf[3]]),
            size_used: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            actual_size: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            crc: u16::from_le_bytes([buf[12], buf[13]]),
            next: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
        }
    }
}

/// Volatile directory over the persistent chain.
pub struct CdsPool {
    classes: Vec<u32>,
    /// First byte of the pool area.
    start: u32,
    /// One past the last usable byte.
    end: u32,
    /// Next un-carved offset.
    cursor: u32,
    /// Offset of the chain's last descriptor.
    tail: Option<u32>,
    /// Free descriptor offsets per class.
    free_lists: Vec<Vec<u32>>,
}

impl CdsPool {
    /// Fresh, empty directory over `[start, end)`.
    pub fn new(classes: Vec<u32>, start: u32, end: u32) -> CdsPool {
        let n = classes.len();
        CdsPool {
            classes,
            start,
            end,
            cursor: start,
            tail: None,
            free_lists: (0..n).map(|_| Vec::new()).collect(),
        }
    }

    /// Read and fully validate the descriptor at `offset`.
    ///
    /// Bounds, check pattern, state flag, and class membership are all
    /// enforced; any violation is a fatal handle error for the caller's
    /// operation.
    pub fn read_desc(
        &self,
        psp: &dyn PlatformSupport,
        offset: u32,
    ) -> Result<BlockDesc, CdsError> {
        if offset < self.start || offset + DESC_SIZE > self.end {
            return Err(CdsError::InvalidHandle);
        }
        let mut buf = [0u8; DESC_SIZE as usize];
        psp.nonvolatile_read(offset as usize, &mut buf)
            .map_err(CdsError::NvIo)?;
        let desc = BlockDesc::decode(&buf);
        if desc.check != CHECK_PATTERN
            || (desc.state != BLOCK_USED && desc.state != BLOCK_UNUSED)
            || !self.classes.contains(&desc.actual_size)
            || offset + DESC_SIZE + desc.actual_size > self.end
        {
            log::error!("[cds] corrupt block descriptor at offset {:#x}", offset);
            return Err(CdsError::InvalidHandle);
        }
        Ok(desc)
    }

    pub fn write_desc(
        &self,
        psp: &dyn PlatformSupport,
        offset: u32,
        desc: &BlockDesc,
    ) -> Result<(), CdsError> {
        psp.nonvolatile_write(offset as usize, &desc.encode())
            .map_err(CdsError::NvIo)
    }

    /// Allocate a block for `size` bytes. Returns the descriptor offset,
    /// which doubles as the block's persistent handle.
    pub fn allocate(
        &mut self,
        psp: &dyn PlatformSupport,
        size: u32,
    ) -> Result<u32, CdsError> {
        let class_idx =
            kestrel_mempool::class_for(&self.classes, size).ok_or(CdsError::BlockSize)?;

        // Recycle a freed block of the class when one exists.
        if let Some(offset) = self.free_lists[class_idx].pop() {
            let mut desc = self.read_desc(psp, offset)?;
            desc.state = BLOCK_USED;
            desc.size_used = size;
            desc.crc = 0;
            self.write_desc(psp, offset, &desc)?;
            return Ok(offset);
        }

        let class_size = self.classes[class_idx];
        let need = DESC_SIZE + class_size;
        if self.cursor + need > self.end {
            return Err(CdsError::BlockSize);
        }
        let offset = self.cursor;
        let desc = BlockDesc {
            check: CHECK_PATTERN,
            state: BLOCK_USED,
            size_used: size,
            actual_size: class_size,
            crc: 0,
            next: 0,
        };
        self.write_desc(psp, offset, &desc)?;

        // Link the previous tail forward to the new block.
        if let Some(tail) = self.tail {
            let mut tail_desc = self.read_desc(psp, tail)?;
            tail_desc.next = offset;
            self.write_desc(psp, tail, &tail_desc)?;
        }
        self.tail = Some(offset);
        self.cursor += need;
        Ok(offset)
    }

    /// Return a block to its class free list.
    pub fn free(&mut self, psp: &dyn PlatformSupport, offset: u32) -> Result<(), CdsError> {
        let mut desc = self.read_desc(psp, offset)?;
        if desc.state != BLOCK_USED {
            return Err(CdsError::InvalidHandle);
        }
        desc.state = BLOCK_UNUSED;
        self.write_desc(psp, offset, &desc)?;
        let class_idx = self
            .classes
            .iter()
            .position(|&c| c == desc.actual_size)
            .ok_or(CdsError::InvalidHandle)?;
        self.free_lists[class_idx].push(offset);
        Ok(())
    }

    /// Reconstruct the directory by walking the descriptor chain from the
    /// start of the pool area.
    ///
    /// Every descriptor must pass its check pattern and chain link
    /// validation; any violation or read failure makes the region corrupt
    /// and the caller wipes it.
    pub fn rebuild(
        psp: &dyn PlatformSupport,
        classes: Vec<u32>,
        start: u32,
        end: u32,
    ) -> Result<CdsPool, CdsError> {
        let mut pool = CdsPool::new(classes, start, end);
        let mut offset = start;
        loop {
            let desc = pool.read_desc(psp, offset)?;
            let after = offset + DESC_SIZE + desc.actual_size;
            if desc.state == BLOCK_UNUSED {
                let class_idx = pool
                    .classes
                    .iter()
                    .position(|&c| c == desc.actual_size)
                    .ok_or(CdsError::InvalidHandle)?;
                pool.free_lists[class_idx].push(offset);
            }
            pool.tail = Some(offset);
            pool.cursor = after;
            if desc.next == 0 {
                break;
            }
            // Blocks are carved contiguously; a link that does not point
            // at the next carved slot is corruption.
            if desc.next != after || desc.next + DESC_SIZE > end {
                log::error!("[cds] broken descriptor chain at offset {:#x}", offset);
                return Err(CdsError::InvalidHandle);
            }
            offset = desc.next;
        }
        Ok(pool)
    }

    /// Bytes not yet carved into blocks.
    pub fn free_bytes(&self) -> u32 {
        self.end - self.cursor
    }
}
