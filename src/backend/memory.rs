//! Segmented memory pool for small, short-lived cells.
//!
//! Requests below the small-object threshold are served from exact-size free
//! lists, or carved from the current block when the list is empty. Requests at
//! or above the threshold get a dedicated allocation that is returned to the
//! system as soon as it is released.
//!
//! Pooling is per exact size: a released cell only ever satisfies a later
//! request of the same size, and neighbouring free cells are never coalesced.
//! When a block cannot fit a request, its unused tail becomes a free cell of
//! the tail's size and a fresh block is obtained.
//!
//! Cells are handles (`block + offset` or `slot + generation`), not pointers,
//! so all access goes through [`MemoryPool::bytes`] and
//! [`MemoryPool::bytes_mut`].

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, trace, warn};

use super::errors::{fatal, SystemError};

/// Requests of this many bytes or more bypass the pool.
pub const DEFAULT_SMALL_OBJECT_THRESHOLD: usize = 500;

/// Size of each block obtained for pooled cells.
pub const DEFAULT_BLOCK_SIZE: usize = 32000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Placement {
    Pooled { block: usize, offset: usize },
    Direct { slot: usize, generation: u32 },
}

/// A span of bytes handed out by a [`MemoryPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    placement: Placement,
    size: usize,
}

impl Cell {
    /// Number of bytes in this cell.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the cell lives in a pooled block (as opposed to a dedicated allocation).
    #[inline]
    pub fn is_pooled(&self) -> bool {
        matches!(self.placement, Placement::Pooled { .. })
    }
}

struct Block {
    bytes: Box<[u8]>,
    top: usize,
    /// Cells carved from this block that have not been reclaimed by `release_all`.
    outstanding: usize,
    /// Offsets of this block's cells currently on a free list.
    free: HashSet<usize>,
}

struct DirectSlot {
    generation: u32,
    bytes: Option<Box<[u8]>>,
}

/// Read-only allocator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Bytes sitting on free lists, ready for reuse.
    pub pool_size: usize,
    /// Bytes currently obtained from the system.
    pub mem_used: usize,
    /// Outstanding system allocations (blocks plus dedicated cells).
    pub mem_requests: usize,
}

/// Called when a request would exceed the memory limit and pooled cells could
/// not cover it. Returns `true` if it made room (freed something or raised the
/// limit) and the request should be retried.
pub type LowMemoryHandler = Box<dyn FnMut(&mut MemoryPool, usize) -> bool>;

pub struct MemoryPool {
    threshold: usize,
    block_size: usize,
    limit: Option<usize>,
    blocks: Vec<Option<Block>>,
    current: Option<usize>,
    free_lists: Vec<Vec<Cell>>,
    direct: Vec<DirectSlot>,
    free_direct: Vec<usize>,
    low_memory: Option<LowMemoryHandler>,
    pool_size: usize,
    mem_used: usize,
    mem_requests: usize,
}

impl MemoryPool {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_SMALL_OBJECT_THRESHOLD, DEFAULT_BLOCK_SIZE, None)
    }

    /// Create a pool with an explicit threshold, block size and optional byte ceiling.
    pub fn with_settings(threshold: usize, block_size: usize, limit: Option<usize>) -> Self {
        MemoryPool {
            threshold,
            block_size: block_size.max(1),
            limit,
            blocks: Vec::new(),
            current: None,
            free_lists: vec![Vec::new(); threshold],
            direct: Vec::new(),
            free_direct: Vec::new(),
            low_memory: None,
            pool_size: 0,
            mem_used: 0,
            mem_requests: 0,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Change the byte ceiling. Does not free anything by itself.
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    pub fn set_low_memory_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&mut MemoryPool, usize) -> bool + 'static,
    {
        self.low_memory = Some(Box::new(handler));
    }

    pub fn clear_low_memory_handler(&mut self) {
        self.low_memory = None;
    }

    /// Allocate `size` bytes. Contents of recycled cells are unspecified.
    pub fn allocate(&mut self, size: usize) -> Cell {
        if size == 0 {
            fatal(SystemError::ZeroSizeAllocation);
        }

        if size >= self.threshold {
            return self.allocate_direct(size);
        }

        if let Some(cell) = self.free_lists[size].pop() {
            self.pool_size -= size;
            self.mark_in_use(&cell);
            trace!(target: "atomtron::memory", size, "Reused pooled cell");
            return cell;
        }

        self.carve(size)
    }

    /// Allocate `size` bytes, all zero.
    pub fn allocate_zeroed(&mut self, size: usize) -> Cell {
        let cell = self.allocate(size);
        self.bytes_mut(&cell).fill(0);
        cell
    }

    /// Return a cell. `size` must be the size it was allocated with.
    pub fn release(&mut self, cell: Cell, size: usize) {
        if size == 0 {
            fatal(SystemError::ZeroSizeRelease);
        }
        if cell.size != size {
            fatal(SystemError::CellSizeMismatch {
                recorded: cell.size,
                requested: size,
            });
        }

        match cell.placement {
            Placement::Pooled { block, offset } => {
                let newly_free = match self.blocks.get_mut(block) {
                    Some(Some(b)) => b.free.insert(offset),
                    _ => fatal(SystemError::StaleCell),
                };
                if !newly_free {
                    fatal(SystemError::StaleCell);
                }
                self.free_lists[size].push(cell);
                self.pool_size += size;
            }
            Placement::Direct { slot, generation } => {
                let entry = match self.direct.get_mut(slot) {
                    Some(entry) if entry.generation == generation && entry.bytes.is_some() => {
                        entry
                    }
                    _ => fatal(SystemError::StaleCell),
                };
                entry.bytes = None;
                entry.generation = entry.generation.wrapping_add(1);
                self.free_direct.push(slot);
                self.mem_used -= size;
                self.mem_requests -= 1;
            }
        }
    }

    /// Give pooled cells back to the system, largest size class first.
    ///
    /// Stops once `max_bytes` have been reclaimed (`0` means no limit). With
    /// `force`, the partially carved current block is retired too and every
    /// free cell is reclaimed regardless of `max_bytes`. Returns the number of
    /// pooled bytes reclaimed.
    pub fn release_all(&mut self, max_bytes: usize, force: bool) -> usize {
        if force {
            self.retire_current();
        }

        let mut reclaimed = 0;
        'sizes: for size in (1..self.threshold).rev() {
            while let Some(cell) = self.free_lists[size].pop() {
                self.pool_size -= size;
                reclaimed += size;
                self.mark_in_use(&cell);
                self.forget_pooled(cell);

                if !force && max_bytes > 0 && reclaimed >= max_bytes {
                    break 'sizes;
                }
            }
        }

        while matches!(self.blocks.last(), Some(None)) {
            self.blocks.pop();
        }

        debug!(target: "atomtron::memory", reclaimed, max_bytes, force, "Released pooled memory");
        reclaimed
    }

    pub fn bytes(&self, cell: &Cell) -> &[u8] {
        match cell.placement {
            Placement::Pooled { block, offset } => match self.blocks.get(block) {
                Some(Some(b)) => &b.bytes[offset..offset + cell.size],
                _ => fatal(SystemError::StaleCell),
            },
            Placement::Direct { slot, generation } => match self.direct.get(slot) {
                Some(DirectSlot {
                    generation: g,
                    bytes: Some(bytes),
                }) if *g == generation => bytes,
                _ => fatal(SystemError::StaleCell),
            },
        }
    }

    pub fn bytes_mut(&mut self, cell: &Cell) -> &mut [u8] {
        match cell.placement {
            Placement::Pooled { block, offset } => match self.blocks.get_mut(block) {
                Some(Some(b)) => &mut b.bytes[offset..offset + cell.size],
                _ => fatal(SystemError::StaleCell),
            },
            Placement::Direct { slot, generation } => match self.direct.get_mut(slot) {
                Some(DirectSlot {
                    generation: g,
                    bytes: Some(bytes),
                }) if *g == generation => bytes,
                _ => fatal(SystemError::StaleCell),
            },
        }
    }

    /// Bytes currently held on free lists.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Bytes currently obtained from the system.
    pub fn mem_used(&self) -> usize {
        self.mem_used
    }

    /// Outstanding system allocations.
    pub fn mem_requests(&self) -> usize {
        self.mem_requests
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            pool_size: self.pool_size,
            mem_used: self.mem_used,
            mem_requests: self.mem_requests,
        }
    }

    fn allocate_direct(&mut self, size: usize) -> Cell {
        self.obtain(size);
        let bytes = vec![0u8; size].into_boxed_slice();

        let (slot, generation) = match self.free_direct.pop() {
            Some(slot) => {
                let entry = &mut self.direct[slot];
                entry.bytes = Some(bytes);
                (slot, entry.generation)
            }
            None => {
                self.direct.push(DirectSlot {
                    generation: 0,
                    bytes: Some(bytes),
                });
                (self.direct.len() - 1, 0)
            }
        };

        trace!(target: "atomtron::memory", size, slot, "Dedicated allocation");
        Cell {
            placement: Placement::Direct { slot, generation },
            size,
        }
    }

    fn carve(&mut self, size: usize) -> Cell {
        if let Some(index) = self.current {
            if let Some(block) = self.blocks[index].as_mut() {
                if block.bytes.len() - block.top >= size {
                    let offset = block.top;
                    block.top += size;
                    block.outstanding += 1;
                    return Cell {
                        placement: Placement::Pooled {
                            block: index,
                            offset,
                        },
                        size,
                    };
                }
            }
            self.retire_current();
        }

        let capacity = self.block_size.max(size);
        self.obtain(capacity);

        let index = self.blocks.len();
        self.blocks.push(Some(Block {
            bytes: vec![0u8; capacity].into_boxed_slice(),
            top: size,
            outstanding: 1,
            free: HashSet::new(),
        }));
        self.current = Some(index);
        debug!(target: "atomtron::memory", index, capacity, "Obtained new block");

        Cell {
            placement: Placement::Pooled {
                block: index,
                offset: 0,
            },
            size,
        }
    }

    /// Stop carving from the current block; its tail joins the free lists.
    fn retire_current(&mut self) {
        let Some(index) = self.current.take() else {
            return;
        };
        let Some(block) = self.blocks[index].as_mut() else {
            return;
        };

        let remainder = block.bytes.len() - block.top;
        if remainder == 0 {
            return;
        }
        let offset = block.top;
        let cell = Cell {
            placement: Placement::Pooled {
                block: index,
                offset,
            },
            size: remainder,
        };
        block.top = block.bytes.len();
        block.outstanding += 1;

        if remainder < self.threshold {
            block.free.insert(offset);
            self.free_lists[remainder].push(cell);
            self.pool_size += remainder;
        } else {
            // Only a forced release retires a tail this large; no request can reuse it.
            self.forget_pooled(cell);
        }
    }

    /// A pooled cell left a free list.
    fn mark_in_use(&mut self, cell: &Cell) {
        if let Placement::Pooled { block, offset } = cell.placement {
            if let Some(Some(b)) = self.blocks.get_mut(block) {
                b.free.remove(&offset);
            }
        }
    }

    /// A pooled cell leaves the pool for good; drop its block once empty.
    fn forget_pooled(&mut self, cell: Cell) {
        let Placement::Pooled { block: index, .. } = cell.placement else {
            return;
        };
        let Some(block) = self.blocks[index].as_mut() else {
            fatal(SystemError::StaleCell);
        };

        block.outstanding -= 1;
        if block.outstanding == 0 && self.current != Some(index) {
            let capacity = block.bytes.len();
            self.blocks[index] = None;
            self.mem_used -= capacity;
            self.mem_requests -= 1;
            trace!(target: "atomtron::memory", index, capacity, "Returned block");
        }
    }

    fn fits(&self, bytes: usize) -> bool {
        match self.limit {
            Some(limit) => self.mem_used.saturating_add(bytes) <= limit,
            None => true,
        }
    }

    /// Account for a system allocation of `bytes`, reclaiming first if needed.
    fn obtain(&mut self, bytes: usize) {
        if !self.fits(bytes) {
            warn!(
                target: "atomtron::memory",
                requested = bytes,
                used = self.mem_used,
                limit = ?self.limit,
                "Memory limit reached, releasing pooled cells"
            );
            self.release_all(bytes, true);

            while !self.fits(bytes) {
                let Some(mut handler) = self.low_memory.take() else {
                    fatal(SystemError::OutOfMemory { requested: bytes });
                };
                let progressed = handler(self, bytes);
                if self.low_memory.is_none() {
                    self.low_memory = Some(handler);
                }
                if !progressed {
                    fatal(SystemError::OutOfMemory { requested: bytes });
                }
            }
        }

        self.mem_used += bytes;
        self.mem_requests += 1;
    }
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPool")
            .field("threshold", &self.threshold)
            .field("block_size", &self.block_size)
            .field("limit", &self.limit)
            .field("blocks", &self.blocks.iter().filter(|b| b.is_some()).count())
            .field("stats", &self.stats())
            .finish()
    }
}
