//! Configuration for a heap instance.
//!
//! - [`HeapConfig`] - Capacity, byte order and buffer id
//! - [`ByteOrder`] - Encoding used by the typed accessors
//!
//! # Example
//!
//! ```
//! use blockheap::{ByteOrder, HeapConfig};
//!
//! let config = HeapConfig::new(64 * 1024)?
//!     .with_byte_order(ByteOrder::LittleEndian)
//!     .with_buffer_id(7);
//!
//! assert_eq!(config.capacity(), 64 * 1024);
//! # Ok::<(), blockheap::HeapError>(())
//! ```

use crate::error::HeapError;

/// Default capacity (1 MiB).
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// Byte order used when reading and writing fixed-width integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Most significant byte first.
    #[default]
    BigEndian,
    /// Least significant byte first.
    LittleEndian,
}

impl ByteOrder {
    pub(crate) fn encode_u32(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        }
    }

    pub(crate) fn decode_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::BigEndian => u32::from_be_bytes(bytes),
            ByteOrder::LittleEndian => u32::from_le_bytes(bytes),
        }
    }

    pub(crate) fn encode_u64(self, value: u64) -> [u8; 8] {
        match self {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        }
    }

    pub(crate) fn decode_u64(self, bytes: [u8; 8]) -> u64 {
        match self {
            ByteOrder::BigEndian => u64::from_be_bytes(bytes),
            ByteOrder::LittleEndian => u64::from_le_bytes(bytes),
        }
    }
}

/// Configuration for a single heap instance.
///
/// The capacity is reserved once when the [`Allocator`](crate::Allocator) is
/// built and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapConfig {
    capacity: usize,
    byte_order: ByteOrder,
    buffer_id: u32,
}

impl HeapConfig {
    /// Creates a new configuration.
    ///
    /// Returns error if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, HeapError> {
        if capacity == 0 {
            return Err(HeapError::InvalidConfig {
                message: "capacity must be non-zero",
            });
        }

        Ok(Self {
            capacity,
            byte_order: ByteOrder::default(),
            buffer_id: 0,
        })
    }

    /// Sets the capacity. Not validated; see [`HeapConfig::validate`].
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the byte order.
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Sets the buffer id stamped on every block and handle.
    pub fn with_buffer_id(mut self, buffer_id: u32) -> Self {
        self.buffer_id = buffer_id;
        self
    }

    /// Returns the capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the byte order.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Returns the buffer id.
    pub fn buffer_id(&self) -> u32 {
        self.buffer_id
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), HeapError> {
        Self::new(self.capacity).map(|_| ())
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            byte_order: ByteOrder::default(),
            buffer_id: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HeapConfig::default();
        assert_eq!(config.capacity(), DEFAULT_CAPACITY);
        assert_eq!(config.byte_order(), ByteOrder::BigEndian);
        assert_eq!(config.buffer_id(), 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = HeapConfig::default()
            .with_capacity(4096)
            .with_byte_order(ByteOrder::LittleEndian)
            .with_buffer_id(3);

        assert_eq!(config.capacity(), 4096);
        assert_eq!(config.byte_order(), ByteOrder::LittleEndian);
        assert_eq!(config.buffer_id(), 3);
    }

    #[test]
    fn test_invalid_config_zero_capacity() {
        assert!(HeapConfig::new(0).is_err());
        assert!(HeapConfig::default().with_capacity(0).validate().is_err());
    }

    #[test]
    fn test_byte_order_encoding() {
        assert_eq!(ByteOrder::BigEndian.encode_u32(1), [0, 0, 0, 1]);
        assert_eq!(ByteOrder::LittleEndian.encode_u32(1), [1, 0, 0, 0]);
        assert_eq!(ByteOrder::BigEndian.decode_u64([0, 0, 0, 0, 0, 0, 1, 0]), 256);
        assert_eq!(
            ByteOrder::LittleEndian.decode_u64(ByteOrder::LittleEndian.encode_u64(42)),
            42
        );
    }
}
