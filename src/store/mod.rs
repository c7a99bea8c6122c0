//! The backing region every block points into.
//!
//! This module owns the single fixed-capacity byte region reserved when a
//! heap is built. It is an implementation detail and not part of the public
//! API: callers reach it only through [`Handle`](crate::Handle)s.

mod backing;

pub(crate) use backing::BackingStore;
