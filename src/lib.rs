//! blockheap
//!
//! A manual block allocator over one pre-allocated, fixed-capacity buffer.
//!
//! `blockheap` reserves a byte region once and carves it into variable-sized
//! blocks on demand. Callers get an opaque [`Handle`] per stored payload and
//! release it explicitly. It is meant for high-churn workloads that want to
//! keep binary payloads out of the general-purpose allocator:
//!
//! - session and message buffers
//! - caches of serialized values
//! - scratch storage shared between worker threads
//!
//! The crate intentionally:
//! - does NOT grow the buffer
//! - does NOT compact non-adjacent free blocks
//! - does NOT use size classes or slabs
//! - does NOT reclaim handles that are dropped without `free`
//!
//! ```text
//!   store(b"abc")                   free(handle)
//!
//!   ┌─────┬──────────────────┐      ┌────────────────────────┐
//!   │ abc │       free       │  →   │          free          │
//!   └─────┴──────────────────┘      └────────────────────────┘
//!    used    remainder                coalesced with neighbours
//! ```
//!
//! # Example
//!
//! ```
//! use blockheap::{Allocator, HeapError};
//!
//! fn main() -> Result<(), HeapError> {
//!     let heap = Allocator::with_capacity(1024)?;
//!
//!     let handle = heap.store(b"Testin")?;
//!     heap.update_in_place(&handle, b"String", 0)?;
//!     assert_eq!(&heap.retrieve(&handle)?[..], b"String");
//!
//!     let released = heap.free(handle);
//!     assert_eq!(released, 6);
//!     Ok(())
//! }
//! ```
//!
//! # Threads
//!
//! [`Allocator`] is `Send + Sync`. Stores and frees serialize on one lock;
//! reads and in-place writes go straight to the buffer under a per-block
//! lease that `free` waits on.
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use blockheap::Allocator;
//!
//! let heap = Arc::new(Allocator::with_capacity(64 * 1024).unwrap());
//!
//! let workers: Vec<_> = (0..4u8)
//!     .map(|n| {
//!         let heap = Arc::clone(&heap);
//!         thread::spawn(move || {
//!             let handle = heap.store(&[n; 32]).unwrap();
//!             assert_eq!(&heap.retrieve(&handle).unwrap()[..], &[n; 32]);
//!             heap.free(handle)
//!         })
//!     })
//!     .collect();
//!
//! for worker in workers {
//!     assert_eq!(worker.join().unwrap(), 32);
//! }
//! assert_eq!(heap.used(), 0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod allocator;
mod config;
mod error;

mod block; // internal block descriptors and leases
mod directory; // internal free-list bookkeeping
mod store; // internal backing region

//
// Public surface
//

pub use allocator::{Allocator, Handle};
pub use block::BlockInfo;
pub use config::{ByteOrder, DEFAULT_CAPACITY, HeapConfig};
pub use error::{BOUNDS_EXCEEDED_CODE, Cause, HeapError, OVERFLOW_CODE, STALE_HANDLE_CODE};
