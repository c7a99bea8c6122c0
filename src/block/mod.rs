//! Block descriptors.
//!
//! - [`Block`] - A contiguous `[start, end)` range tagged free or used
//! - [`BlockId`] - Arena index plus generation
//! - [`BlockInfo`] - Public snapshot of a block, used for layout inspection
//! - [`Lease`] - In-flight reservation of a used block

mod lease;

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

pub(crate) use lease::{Lease, LeaseGuard};

/// Identifies a block slot in the directory arena.
///
/// The generation is unique per directory for the lifetime of the directory,
/// so an id taken from a freed or cleared block never matches the block that
/// later reuses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BlockId {
    pub index: usize,
    pub generation: u64,
}

/// A descriptor of a contiguous range of the backing store.
///
/// Ranges are half-open: the block covers `start..end` and its size is
/// `end - start`. Neighbouring blocks share the boundary value.
#[derive(Debug)]
pub(crate) struct Block {
    pub start: usize,
    pub end: usize,
    pub free: bool,
    pub buffer_id: u32,
    /// Physically preceding block, not the previously allocated one.
    pub prev: Option<BlockId>,
    /// Physically following block.
    pub next: Option<BlockId>,
    /// Payload length recorded at store time; zero while free.
    pub payload_len: usize,
    /// Present only while the block is used.
    pub lease: Option<Arc<Lease>>,
}

impl Block {
    /// A free block with no neighbours.
    pub fn free(start: usize, end: usize, buffer_id: u32) -> Self {
        Self {
            start,
            end,
            free: true,
            buffer_id,
            prev: None,
            next: None,
            payload_len: 0,
            lease: None,
        }
    }

    pub fn size(&self) -> usize {
        self.end - self.start
    }

    pub fn info(&self) -> BlockInfo {
        BlockInfo {
            start: self.start,
            end: self.end,
            free: self.free,
        }
    }
}

/// A point-in-time view of one block, as returned by
/// [`Allocator::blocks`](crate::Allocator::blocks).
///
/// # Example
///
/// ```
/// use blockheap::Allocator;
///
/// let heap = Allocator::with_capacity(64)?;
/// let handle = heap.store(b"abc")?;
///
/// let blocks = heap.blocks();
/// assert_eq!(blocks.len(), 2);
/// assert_eq!(blocks[0].range(), 0..3);
/// assert!(!blocks[0].free);
/// assert!(blocks[1].free);
/// # heap.free(handle);
/// # Ok::<(), blockheap::HeapError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    /// First byte of the block.
    pub start: usize,
    /// One past the last byte of the block.
    pub end: usize,
    /// Whether the block is available for allocation.
    pub free: bool,
}

impl BlockInfo {
    /// Returns the block size in bytes.
    pub fn size(&self) -> usize {
        self.end - self.start
    }

    /// Returns the block as a range.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.free { "free" } else { "used" };
        write!(f, "[{}, {}) {}", self.start, self.end, state)
    }
}
