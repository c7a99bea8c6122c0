//! Core allocator - stores payloads in one fixed-capacity buffer.
//!
//! [`Allocator`] reserves its buffer once and hands out [`Handle`]s to the
//! blocks it carves from it:
//!
//! - `store()` - First-fit a free block, slice it, write the payload
//! - `retrieve()` / `update_in_place()` - Bounds-checked access through a handle
//! - `free()` - Release a block and coalesce it with free neighbours
//! - `clear()` - Drop every block and start over
//!
//! # Example
//!
//! ```
//! use blockheap::Allocator;
//!
//! let heap = Allocator::with_capacity(1024)?;
//!
//! let handle = heap.store(b"TestString")?;
//! assert_eq!(&heap.retrieve(&handle)?[..], b"TestString");
//! assert_eq!(heap.used(), 10);
//!
//! assert_eq!(heap.free(handle), 10);
//! assert_eq!(heap.used(), 0);
//! # Ok::<(), blockheap::HeapError>(())
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::Handle;
use crate::block::{BlockInfo, LeaseGuard};
use crate::config::{ByteOrder, HeapConfig};
use crate::directory::BlockDirectory;
use crate::error::HeapError;
use crate::store::BackingStore;

/// Tags handles with the heap that issued them.
static NEXT_HEAP: AtomicU64 = AtomicU64::new(0);

/// A first-fit block allocator over a single pre-allocated buffer.
///
/// `Allocator` is `Send + Sync` and meant to be shared (for example behind an
/// `Arc`) by many threads.
///
/// # Concurrency
///
/// - `store`, `free` and `clear` serialize on one directory lock. A store
///   holds it across first-fit, slicing and the payload write, so two stores
///   never receive overlapping blocks.
/// - `retrieve` and `update_in_place` skip the directory lock. They enter the
///   block's lease instead, and `free`/`clear` wait for every entered
///   operation to leave before the range can be handed out again.
///
/// # Accounting
///
/// [`Allocator::used`] counts payload bytes, not block bytes. A payload
/// stored with extra capacity, or bytes lost to splitting, do not show up in
/// it.
///
/// # Example
///
/// ```
/// use blockheap::Allocator;
///
/// let heap = Allocator::with_capacity(15)?;
///
/// let handle = heap.store(b"TestString")?;
/// heap.free(handle);
///
/// // the freed region is reused for two smaller payloads
/// let a = heap.store(b"Test")?;
/// let b = heap.store(b"String")?;
/// assert_eq!(&heap.retrieve(&a)?[..], b"Test");
/// assert_eq!(&heap.retrieve(&b)?[..], b"String");
/// # Ok::<(), blockheap::HeapError>(())
/// ```
pub struct Allocator {
    directory: Mutex<BlockDirectory>,
    store: BackingStore,
    used: AtomicUsize,
    config: HeapConfig,
    heap: u64,
}

impl Allocator {
    /// Creates an allocator from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: HeapConfig) -> Result<Self, HeapError> {
        config.validate()?;

        info!(
            capacity = config.capacity(),
            buffer_id = config.buffer_id(),
            byte_order = ?config.byte_order(),
            "creating off-heap buffer"
        );

        Ok(Self {
            directory: Mutex::new(BlockDirectory::new(
                config.capacity(),
                config.buffer_id(),
            )),
            store: BackingStore::new(config.capacity(), config.byte_order()),
            used: AtomicUsize::new(0),
            config,
            heap: NEXT_HEAP.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// Creates an allocator of `capacity` bytes with default settings.
    ///
    /// # Example
    ///
    /// ```
    /// use blockheap::Allocator;
    ///
    /// let heap = Allocator::with_capacity(4096)?;
    /// assert_eq!(heap.capacity(), 4096);
    /// assert_eq!(heap.used(), 0);
    ///
    /// assert!(Allocator::with_capacity(0).is_err());
    /// # Ok::<(), blockheap::HeapError>(())
    /// ```
    pub fn with_capacity(capacity: usize) -> Result<Self, HeapError> {
        Self::new(HeapConfig::new(capacity)?)
    }

    /// Stores `payload` in a block of exactly `payload.len()` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::Overflow`] if no free block can hold it.
    pub fn store(&self, payload: &[u8]) -> Result<Handle, HeapError> {
        self.store_with_capacity(payload, payload.len())
    }

    /// Stores `payload` at the start of a block of `capacity` bytes.
    ///
    /// The block is taken from the lowest-addressed free block strictly
    /// larger than `capacity`; a failed store leaves the heap untouched.
    /// Bytes past the payload are not cleared and may hold data from an
    /// earlier block.
    ///
    /// A free block is never filled to its last byte. A freed hole of `N`
    /// bytes between two used blocks cannot take an `N`-byte payload, and
    /// stores split across it leave its final byte unused until a neighbour
    /// is freed and the hole merges. The same holds for the whole buffer: a
    /// heap of `capacity` bytes holds at most `capacity - 1` payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::Overflow`] if `payload` is longer than
    /// `capacity` or if no free block qualifies.
    ///
    /// # Example
    ///
    /// ```
    /// use blockheap::Allocator;
    ///
    /// let heap = Allocator::with_capacity(64)?;
    /// let handle = heap.store_with_capacity(b"abc", 8)?;
    ///
    /// assert_eq!(handle.size(), 8);
    /// assert_eq!(handle.payload_len(), 3);
    /// assert_eq!(heap.used(), 3);
    /// # Ok::<(), blockheap::HeapError>(())
    /// ```
    pub fn store_with_capacity(
        &self,
        payload: &[u8],
        capacity: usize,
    ) -> Result<Handle, HeapError> {
        if payload.len() > capacity {
            return Err(HeapError::overflow(
                "payload is larger than the requested capacity",
            ));
        }

        let mut directory = self.directory.lock();

        let fit = directory
            .first_fit(capacity)
            .ok_or_else(|| HeapError::overflow("did not find a suitable block"))?;
        let id = directory
            .slice(fit, capacity)
            .ok_or_else(|| HeapError::overflow("sliced block is smaller than requested"))?;

        let (start, end) = match directory.get(id) {
            Some(block) => (block.start, block.end),
            None => return Err(HeapError::overflow("sliced block vanished")),
        };

        if let Err(err) = self.store.write(start, 0, payload, end) {
            directory.free_and_merge(id);
            return Err(HeapError::overflow(
                "an attempt to store more than the block extent",
            )
            .with_cause(err));
        }

        let Some(lease) = directory.claim(id, payload.len()) else {
            directory.free_and_merge(id);
            return Err(HeapError::overflow("sliced block was not reserved"));
        };

        self.used.fetch_add(payload.len(), Ordering::AcqRel);
        debug!(start, size = capacity, payload = payload.len(), "stored payload");

        Ok(Handle {
            id,
            start,
            size: end - start,
            payload_len: payload.len(),
            buffer_id: self.config.buffer_id(),
            heap: self.heap,
            lease,
        })
    }

    /// Enters the handle's lease for one lock-free access.
    fn enter<'h>(&self, handle: &'h Handle) -> Result<LeaseGuard<'h>, HeapError> {
        if handle.heap != self.heap {
            return Err(HeapError::bounds_exceeded(
                "handle was issued by another buffer",
            ));
        }
        handle.lease.enter().ok_or_else(HeapError::stale_handle)
    }

    /// Returns the whole block behind `handle`.
    pub fn retrieve(&self, handle: &Handle) -> Result<Bytes, HeapError> {
        self.retrieve_range(handle, 0, handle.size())
    }

    /// Returns `len` bytes starting `offset` bytes into the block.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::BoundsExceeded`] if `offset + len` runs past the
    /// block, or if the handle was invalidated by [`Allocator::clear`].
    ///
    /// # Example
    ///
    /// ```
    /// use blockheap::Allocator;
    ///
    /// let heap = Allocator::with_capacity(64)?;
    /// let handle = heap.store(b"TestString")?;
    ///
    /// assert_eq!(&heap.retrieve_range(&handle, 4, 6)?[..], b"String");
    /// assert!(heap.retrieve_range(&handle, 4, 7).is_err());
    /// # Ok::<(), blockheap::HeapError>(())
    /// ```
    pub fn retrieve_range(
        &self,
        handle: &Handle,
        offset: usize,
        len: usize,
    ) -> Result<Bytes, HeapError> {
        let _guard = self.enter(handle)?;
        self.store.read(handle.start, offset, len, handle.end())
    }

    /// Overwrites part of the block in place. The handle stays valid.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::BoundsExceeded`] if `offset + payload.len()` runs
    /// past the block, or if the handle was invalidated by
    /// [`Allocator::clear`]. Nothing is written on error.
    pub fn update_in_place(
        &self,
        handle: &Handle,
        payload: &[u8],
        offset: usize,
    ) -> Result<(), HeapError> {
        let _guard = self.enter(handle)?;
        self.store.write(handle.start, offset, payload, handle.end())
    }

    /// Frees `handle` and stores `payload` in a new block.
    ///
    /// The old block is released and coalesced first, so the new payload may
    /// land in the same region.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::Overflow`] if the new payload does not fit. The
    /// old block stays freed in that case.
    ///
    /// # Example
    ///
    /// ```
    /// use blockheap::Allocator;
    ///
    /// let heap = Allocator::with_capacity(64)?;
    /// let handle = heap.store(b"Test")?;
    ///
    /// let handle = heap.update(handle, b"String")?;
    /// assert_eq!(&heap.retrieve(&handle)?[..], b"String");
    /// assert_eq!(heap.used(), 6);
    /// # Ok::<(), blockheap::HeapError>(())
    /// ```
    pub fn update(&self, handle: Handle, payload: &[u8]) -> Result<Handle, HeapError> {
        let released = self.free(handle);
        debug!(released, payload = payload.len(), "reallocating payload");
        self.store(payload)
    }

    /// Reads a `u32` at `offset` using the configured byte order.
    pub fn retrieve_u32(&self, handle: &Handle, offset: usize) -> Result<u32, HeapError> {
        let _guard = self.enter(handle)?;
        let bytes = self.store.read_array::<4>(handle.start, offset, handle.end())?;
        Ok(self.store.byte_order().decode_u32(bytes))
    }

    /// Reads a `u64` at `offset` using the configured byte order.
    pub fn retrieve_u64(&self, handle: &Handle, offset: usize) -> Result<u64, HeapError> {
        let _guard = self.enter(handle)?;
        let bytes = self.store.read_array::<8>(handle.start, offset, handle.end())?;
        Ok(self.store.byte_order().decode_u64(bytes))
    }

    /// Writes a `u32` at `offset` using the configured byte order.
    pub fn update_u32(&self, handle: &Handle, offset: usize, value: u32) -> Result<(), HeapError> {
        let bytes = self.store.byte_order().encode_u32(value);
        self.update_in_place(handle, &bytes, offset)
    }

    /// Writes a `u64` at `offset` using the configured byte order.
    pub fn update_u64(&self, handle: &Handle, offset: usize, value: u64) -> Result<(), HeapError> {
        let bytes = self.store.byte_order().encode_u64(value);
        self.update_in_place(handle, &bytes, offset)
    }

    /// Releases the block behind `handle` and merges it with free neighbours.
    ///
    /// Waits for in-flight reads and writes on the block to finish. Returns
    /// the payload length that was released. Freeing a handle that was
    /// already invalidated by [`Allocator::clear`], or that belongs to
    /// another buffer, does nothing and returns 0.
    pub fn free(&self, handle: Handle) -> usize {
        if handle.heap != self.heap {
            warn!(
                buffer_id = handle.buffer_id,
                "ignoring free of a handle issued by another buffer"
            );
            return 0;
        }

        let mut directory = self.directory.lock();
        if !directory.owns(handle.id, &handle.lease) {
            warn!(start = handle.start, "ignoring free of a stale handle");
            return 0;
        }

        handle.lease.retire();
        handle.lease.wait_drained();

        let Some(released) = directory.free_and_merge(handle.id) else {
            return 0;
        };
        self.used.fetch_sub(released, Ordering::AcqRel);
        debug!(start = handle.start, size = handle.size, released, "freed block");
        released
    }

    /// Drops every block, zeroes the buffer and resets [`Allocator::used`].
    ///
    /// Every outstanding handle becomes stale. In-flight reads and writes
    /// finish before the buffer is reused.
    pub fn clear(&self) {
        let mut directory = self.directory.lock();
        let leases = directory.reset();
        for lease in &leases {
            lease.retire();
        }
        for lease in &leases {
            lease.wait_drained();
        }
        self.store.clear();
        self.used.store(0, Ordering::Release);
        info!(
            buffer_id = self.config.buffer_id(),
            dropped = leases.len(),
            "cleared buffer"
        );
    }

    /// Payload bytes currently stored.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// Total buffer size in bytes.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Buffer id stamped on every handle.
    pub fn buffer_id(&self) -> u32 {
        self.config.buffer_id()
    }

    /// Byte order used by the typed accessors.
    pub fn byte_order(&self) -> ByteOrder {
        self.store.byte_order()
    }

    /// Returns the configuration this allocator was built from.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Snapshot of every block in address order.
    pub fn blocks(&self) -> Vec<BlockInfo> {
        self.directory.lock().blocks()
    }

    /// Number of blocks, free and used.
    pub fn block_count(&self) -> usize {
        self.directory.lock().len()
    }

    /// Total bytes held by free blocks.
    pub fn free_bytes(&self) -> usize {
        self.directory.lock().free_bytes()
    }

    /// Size of the largest free block. A store needs strictly less than this.
    pub fn largest_free(&self) -> usize {
        self.directory.lock().largest_free()
    }

    /// Checks the block layout: blocks tile the buffer with no gap or
    /// overlap, neighbour links agree, and no two free blocks touch.
    ///
    /// Returns a description of the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        self.directory.lock().verify()
    }
}

impl std::fmt::Debug for Allocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocator")
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .field("buffer_id", &self.buffer_id())
            .finish()
    }
}
