//! The block directory: every block of one heap, free and used.
//!
//! Blocks live in an arena of generation-tagged slots and link to their
//! physical neighbours by [`BlockId`]. Free blocks are additionally indexed
//! by start offset so that first-fit walks them in address order without
//! touching used blocks.
//!
//! ```text
//!   chain (physical order):
//!
//!   head
//!    │
//!    ▼
//!   ┌────────┐    ┌────────────┐    ┌─────────┐    ┌──────────────────┐
//!   │ [0,10) │◄──►│ [10,30)    │◄──►│ [30,34) │◄──►│ [34,capacity)    │
//!   │  used  │    │  free      │    │  used   │    │  free            │
//!   └────────┘    └────────────┘    └─────────┘    └──────────────────┘
//!
//!   free index (by start): { 10 => .., 34 => .. }
//! ```
//!
//! The directory itself is not synchronized; the allocator keeps it behind a
//! single mutex.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use crate::block::{Block, BlockId, BlockInfo, Lease};

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    block: Option<Block>,
}

/// All blocks of one heap, tiling `[0, capacity)` with no gap and no overlap.
#[derive(Debug)]
pub(crate) struct BlockDirectory {
    slots: Vec<Slot>,
    vacant: Vec<usize>,
    // start => id, free blocks only
    free_index: BTreeMap<usize, BlockId>,
    head: Option<BlockId>,
    capacity: usize,
    buffer_id: u32,
    next_generation: u64,
    live: usize,
}

impl BlockDirectory {
    /// Creates a directory holding one free block of `capacity` bytes.
    pub fn new(capacity: usize, buffer_id: u32) -> Self {
        let mut directory = Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            free_index: BTreeMap::new(),
            head: None,
            capacity,
            buffer_id,
            next_generation: 0,
            live: 0,
        };
        directory.seed();
        directory
    }

    fn seed(&mut self) {
        let id = self.insert(Block::free(0, self.capacity, self.buffer_id));
        self.head = Some(id);
    }

    /// Number of blocks, free and used.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.block.as_ref()
    }

    fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.block.as_mut()
    }

    /// Stores `block` in a fresh slot and indexes it if free.
    ///
    /// Does not touch neighbour links; callers wire `prev`/`next` themselves.
    pub fn insert(&mut self, block: Block) -> BlockId {
        let generation = self.next_generation;
        self.next_generation += 1;

        let (free, start) = (block.free, block.start);
        let index = match self.vacant.pop() {
            Some(index) => {
                self.slots[index] = Slot {
                    generation,
                    block: Some(block),
                };
                index
            }
            None => {
                self.slots.push(Slot {
                    generation,
                    block: Some(block),
                });
                self.slots.len() - 1
            }
        };

        let id = BlockId { index, generation };
        if free {
            self.free_index.insert(start, id);
        }
        self.live += 1;
        id
    }

    /// Takes a block out of the arena and the free index.
    ///
    /// Does not touch neighbour links.
    pub fn remove(&mut self, id: BlockId) -> Option<Block> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        let block = slot.block.take()?;

        self.vacant.push(id.index);
        self.live -= 1;
        if block.free && self.free_index.get(&block.start) == Some(&id) {
            self.free_index.remove(&block.start);
        }
        Some(block)
    }

    /// Returns the lowest-addressed free block whose size is strictly greater
    /// than `capacity`.
    ///
    /// A free block of exactly `capacity` bytes is skipped here; it is only
    /// reused through the exact-match path of [`BlockDirectory::slice`].
    pub fn first_fit(&self, capacity: usize) -> Option<BlockId> {
        self.free_index
            .values()
            .copied()
            .find(|id| self.get(*id).is_some_and(|b| b.size() > capacity))
    }

    /// Carves a used block of exactly `capacity` bytes from the head of the
    /// free block `id`.
    ///
    /// If `id` is already exactly `capacity` bytes it is marked used and
    /// returned as is. Otherwise the new block takes over `id`'s place in the
    /// chain and `id` shrinks to the free remainder. Returns `None` if `id` is
    /// not a free block of at least `capacity` bytes.
    pub fn slice(&mut self, id: BlockId, capacity: usize) -> Option<BlockId> {
        let block = self.get(id)?;
        if !block.free || block.size() < capacity {
            return None;
        }

        let (start, prev, buffer_id) = (block.start, block.prev, block.buffer_id);

        if block.size() == capacity {
            self.free_index.remove(&start);
            self.get_mut(id)?.free = false;
            self.debug_verify();
            return Some(id);
        }

        let fresh_id = self.insert(Block {
            start,
            end: start + capacity,
            free: false,
            buffer_id,
            prev,
            next: Some(id),
            payload_len: 0,
            lease: None,
        });

        self.free_index.remove(&start);
        let rest = self.get_mut(id)?;
        rest.start = start + capacity;
        rest.prev = Some(fresh_id);
        self.free_index.insert(start + capacity, id);

        self.relink_next(prev, Some(fresh_id));

        trace!(start, capacity, "sliced block");
        self.debug_verify();
        Some(fresh_id)
    }

    /// Attaches the payload length and a fresh lease to a used block.
    pub fn claim(&mut self, id: BlockId, payload_len: usize) -> Option<Arc<Lease>> {
        let block = self.get_mut(id)?;
        if block.free {
            return None;
        }
        let lease = Arc::new(Lease::new());
        block.payload_len = payload_len;
        block.lease = Some(Arc::clone(&lease));
        Some(lease)
    }

    /// Returns true if `id` is a used block guarded by exactly `lease`.
    pub fn owns(&self, id: BlockId, lease: &Arc<Lease>) -> bool {
        self.get(id).is_some_and(|b| {
            !b.free && b.lease.as_ref().is_some_and(|l| Arc::ptr_eq(l, lease))
        })
    }

    /// Marks `id` free and absorbs free neighbours until none are left.
    ///
    /// Returns the payload length recorded for the block, or `None` if the
    /// block is unknown or already free.
    pub fn free_and_merge(&mut self, id: BlockId) -> Option<usize> {
        let block = self.get_mut(id)?;
        if block.free {
            return None;
        }
        block.free = true;
        block.lease = None;
        let payload_len = std::mem::take(&mut block.payload_len);

        while let Some(prev_id) = self.get(id)?.prev {
            if !self.get(prev_id).is_some_and(|b| b.free) {
                break;
            }
            let Some(prev) = self.remove(prev_id) else {
                break;
            };
            let block = self.get_mut(id)?;
            block.start = prev.start;
            block.prev = prev.prev;
            self.relink_next(prev.prev, Some(id));
            trace!(start = prev.start, end = prev.end, "merged previous block");
        }

        while let Some(next_id) = self.get(id)?.next {
            if !self.get(next_id).is_some_and(|b| b.free) {
                break;
            }
            let Some(next) = self.remove(next_id) else {
                break;
            };
            let block = self.get_mut(id)?;
            block.end = next.end;
            block.next = next.next;
            self.relink_prev(next.next, Some(id));
            trace!(start = next.start, end = next.end, "merged next block");
        }

        let block = self.get(id)?;
        let (start, size, prev, next) = (block.start, block.size(), block.prev, block.next);
        if size == 0 {
            // empty reservations leave no free block behind
            self.remove(id);
            self.relink_next(prev, next);
            self.relink_prev(next, prev);
        } else {
            self.free_index.insert(start, id);
        }

        self.debug_verify();
        Some(payload_len)
    }

    /// Points `prev`'s forward link (or the chain head) at `target`.
    fn relink_next(&mut self, prev: Option<BlockId>, target: Option<BlockId>) {
        match prev {
            Some(prev) => {
                if let Some(block) = self.get_mut(prev) {
                    block.next = target;
                }
            }
            None => self.head = target,
        }
    }

    /// Points `next`'s backward link at `target`.
    fn relink_prev(&mut self, next: Option<BlockId>, target: Option<BlockId>) {
        if let Some(block) = next.and_then(|next| self.get_mut(next)) {
            block.prev = target;
        }
    }

    /// Drops every block and starts over with one free block.
    ///
    /// Returns the leases of the blocks that were in use so the caller can
    /// retire them. Generations keep counting, so ids handed out before the
    /// reset never resolve again.
    pub fn reset(&mut self) -> Vec<Arc<Lease>> {
        let leases: Vec<_> = self
            .slots
            .iter_mut()
            .filter_map(|slot| slot.block.take())
            .filter_map(|block| block.lease)
            .collect();

        self.slots.clear();
        self.vacant.clear();
        self.free_index.clear();
        self.head = None;
        self.live = 0;
        self.seed();
        leases
    }

    /// Walks the chain in address order.
    fn chain(&self) -> impl Iterator<Item = (BlockId, &Block)> + '_ {
        let first = self.head.and_then(|id| self.get(id).map(|b| (id, b)));
        std::iter::successors(first, move |(_, block)| {
            block.next.and_then(|id| self.get(id).map(|b| (id, b)))
        })
    }

    /// Snapshot of every block in address order.
    pub fn blocks(&self) -> Vec<BlockInfo> {
        self.chain().map(|(_, block)| block.info()).collect()
    }

    /// Total bytes held by free blocks.
    pub fn free_bytes(&self) -> usize {
        self.free_index
            .values()
            .filter_map(|id| self.get(*id))
            .map(Block::size)
            .sum()
    }

    /// Size of the largest free block.
    pub fn largest_free(&self) -> usize {
        self.free_index
            .values()
            .filter_map(|id| self.get(*id))
            .map(Block::size)
            .max()
            .unwrap_or(0)
    }

    /// Checks the partition, chain and no-adjacent-free invariants.
    pub fn verify(&self) -> Result<(), String> {
        let mut cursor = self.head;
        let mut prev: Option<BlockId> = None;
        let mut prev_free = false;
        let mut expected_start = 0;
        let mut seen = 0;
        let mut free_seen = 0;

        while let Some(id) = cursor {
            let block = self
                .get(id)
                .ok_or_else(|| format!("dangling link to slot {}", id.index))?;

            if block.start != expected_start {
                return Err(format!(
                    "expected a block at {}, found one at {}",
                    expected_start, block.start
                ));
            }
            if block.end < block.start {
                return Err(format!("block at {} ends before it starts", block.start));
            }
            if block.prev != prev {
                return Err(format!("block at {} has a stale prev link", block.start));
            }
            if block.free {
                if prev_free {
                    return Err(format!("adjacent free blocks meet at {}", block.start));
                }
                if block.size() == 0 {
                    return Err(format!("empty free block at {}", block.start));
                }
                if self.free_index.get(&block.start) != Some(&id) {
                    return Err(format!("free block at {} is not indexed", block.start));
                }
                free_seen += 1;
            }

            seen += 1;
            if seen > self.live {
                return Err("block chain is cyclic".to_string());
            }

            prev_free = block.free;
            expected_start = block.end;
            prev = Some(id);
            cursor = block.next;
        }

        if expected_start != self.capacity {
            return Err(format!(
                "blocks cover {} of {} bytes",
                expected_start, self.capacity
            ));
        }
        if seen != self.live {
            return Err(format!("{} blocks reachable, {} live", seen, self.live));
        }
        if free_seen != self.free_index.len() {
            return Err(format!(
                "{} free blocks reachable, {} indexed",
                free_seen,
                self.free_index.len()
            ));
        }
        Ok(())
    }

    fn debug_verify(&self) {
        debug_assert_eq!(self.verify(), Ok(()));
    }
}
