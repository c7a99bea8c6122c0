//! Fixed-capacity byte region with block-scoped bounds checks.

use std::ops::Range;
use std::sync::atomic::{AtomicU8, Ordering};

use bytes::Bytes;

use crate::config::ByteOrder;
use crate::error::HeapError;

/// A contiguous byte region, allocated once and never resized.
///
/// Bytes are stored as `AtomicU8` so that readers and writers working on
/// disjoint blocks can run in parallel without sharing a cursor. Every call
/// computes its own absolute range; nothing about one call leaks into the
/// next.
pub(crate) struct BackingStore {
    bytes: Box<[AtomicU8]>,
    byte_order: ByteOrder,
}

impl BackingStore {
    /// Reserves `capacity` zeroed bytes.
    pub fn new(capacity: usize, byte_order: ByteOrder) -> Self {
        let bytes = (0..capacity).map(|_| AtomicU8::new(0)).collect();
        Self { bytes, byte_order }
    }

    /// Returns the capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the configured byte order.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Resolves `[start + offset, start + offset + len)` and checks it against
    /// both the block end (exclusive) and the store capacity.
    fn resolve(
        &self,
        start: usize,
        offset: usize,
        len: usize,
        block_end: usize,
    ) -> Result<Range<usize>, HeapError> {
        let from = start
            .checked_add(offset)
            .ok_or_else(|| HeapError::bounds_exceeded("offset overflows the address space"))?;
        let to = from
            .checked_add(len)
            .ok_or_else(|| HeapError::bounds_exceeded("length overflows the address space"))?;

        if to > block_end {
            return Err(HeapError::bounds_exceeded(
                "access runs past the end of the block",
            ));
        }
        if to > self.capacity() {
            return Err(HeapError::bounds_exceeded(
                "access runs past the end of the buffer",
            ));
        }

        Ok(from..to)
    }

    /// Copies `len` bytes starting at `start + offset`.
    pub fn read(
        &self,
        start: usize,
        offset: usize,
        len: usize,
        block_end: usize,
    ) -> Result<Bytes, HeapError> {
        let range = self.resolve(start, offset, len, block_end)?;
        let data: Vec<u8> = self.bytes[range]
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        Ok(Bytes::from(data))
    }

    /// Reads exactly `N` bytes into an array.
    pub fn read_array<const N: usize>(
        &self,
        start: usize,
        offset: usize,
        block_end: usize,
    ) -> Result<[u8; N], HeapError> {
        let range = self.resolve(start, offset, N, block_end)?;
        let mut out = [0u8; N];
        for (dst, src) in out.iter_mut().zip(&self.bytes[range]) {
            *dst = src.load(Ordering::Relaxed);
        }
        Ok(out)
    }

    /// Copies `payload` to `start + offset`.
    pub fn write(
        &self,
        start: usize,
        offset: usize,
        payload: &[u8],
        block_end: usize,
    ) -> Result<(), HeapError> {
        let range = self.resolve(start, offset, payload.len(), block_end)?;
        for (dst, src) in self.bytes[range].iter().zip(payload) {
            dst.store(*src, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Zeroes every byte.
    pub fn clear(&self) {
        for b in self.bytes.iter() {
            b.store(0, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackingStore")
            .field("capacity", &self.capacity())
            .field("byte_order", &self.byte_order)
            .finish()
    }
}
