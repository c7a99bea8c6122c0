//! In-flight reservation shared by a used block and its handle.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Top bit marks the lease as retired; the remaining bits count readers and
/// writers currently inside the block.
const RETIRED: usize = 1 << (usize::BITS - 1);

/// Spins before falling back to yielding the thread while draining.
const SPIN_LIMIT: u32 = 64;

/// Guards the byte range of one used block against reuse while a lock-free
/// read or write is still touching it.
///
/// `retrieve`/`update` enter the lease without the directory lock. `free` and
/// `clear` retire it and wait until the in-flight count drops to zero before
/// the range can be sliced again. A retired lease never admits new entries.
#[derive(Debug, Default)]
pub(crate) struct Lease {
    state: AtomicUsize,
}

/// Keeps one in-flight slot of a [`Lease`] until dropped.
#[derive(Debug)]
pub(crate) struct LeaseGuard<'a> {
    lease: &'a Lease,
}

impl Lease {
    /// Creates a live lease with nothing in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an in-flight operation. Returns `None` once retired.
    pub fn enter(&self) -> Option<LeaseGuard<'_>> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current & RETIRED != 0 {
                return None;
            }
            match self.state.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(LeaseGuard { lease: self }),
                Err(actual) => current = actual,
            }
        }
    }

    /// Retires the lease. Returns true if this call did the retiring.
    pub fn retire(&self) -> bool {
        self.state.fetch_or(RETIRED, Ordering::AcqRel) & RETIRED == 0
    }

    /// Returns true once [`Lease::retire`] has been called.
    pub fn is_retired(&self) -> bool {
        self.state.load(Ordering::Acquire) & RETIRED != 0
    }

    /// Number of operations currently inside the block.
    pub fn in_flight(&self) -> usize {
        self.state.load(Ordering::Acquire) & !RETIRED
    }

    /// Blocks until every in-flight operation has left.
    ///
    /// Only meaningful after [`Lease::retire`]; a live lease may keep
    /// admitting new entries.
    pub fn wait_drained(&self) {
        let mut spins = 0;
        while self.in_flight() != 0 {
            if spins < SPIN_LIMIT {
                spins += 1;
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        self.lease.state.fetch_sub(1, Ordering::Release);
    }
}
