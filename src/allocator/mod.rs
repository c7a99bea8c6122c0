//! Allocator types.
//!
//! - [`Allocator`] - Store, retrieve, update and free payloads
//! - [`Handle`] - Reference to one stored payload

mod engine;
mod handle;

pub use engine::Allocator;
pub use handle::Handle;
