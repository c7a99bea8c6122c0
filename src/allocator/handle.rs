//! The caller-visible reference to a stored payload.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::block::{BlockId, Lease};

/// A handle to one used block, returned by [`Allocator::store`].
///
/// A handle is the only way to reach its block. It is deliberately not
/// `Clone`: [`Allocator::free`] and the reallocating [`Allocator::update`]
/// consume it, so a freed handle cannot be used again. Handles outlived by
/// an [`Allocator::clear`] are rejected with
/// [`HeapError::BoundsExceeded`](crate::HeapError::BoundsExceeded).
///
/// [`Allocator::store`]: crate::Allocator::store
/// [`Allocator::free`]: crate::Allocator::free
/// [`Allocator::update`]: crate::Allocator::update
/// [`Allocator::clear`]: crate::Allocator::clear
pub struct Handle {
    pub(crate) id: BlockId,
    pub(crate) start: usize,
    pub(crate) size: usize,
    pub(crate) payload_len: usize,
    pub(crate) buffer_id: u32,
    pub(crate) heap: u64,
    pub(crate) lease: Arc<Lease>,
}

impl Handle {
    /// Offset of the block within the buffer.
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last byte of the block.
    pub fn end(&self) -> usize {
        self.start + self.size
    }

    /// Block size in bytes. At least [`Handle::payload_len`].
    pub fn size(&self) -> usize {
        self.size
    }

    /// Length of the payload written by `store`.
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// The block as a range of buffer offsets.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Id of the buffer that issued this handle.
    pub fn buffer_id(&self) -> u32 {
        self.buffer_id
    }

    /// Returns false once the block was invalidated by a clear.
    pub fn is_live(&self) -> bool {
        !self.lease.is_retired()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("range", &self.range())
            .field("payload_len", &self.payload_len)
            .field("buffer_id", &self.buffer_id)
            .field("live", &self.is_live())
            .finish()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Handle({} bytes @ {} in buffer {})",
            self.size, self.start, self.buffer_id
        )
    }
}
