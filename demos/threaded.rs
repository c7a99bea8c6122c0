//! Several workers sharing one heap through an `Arc`.
//!
//! Run with:
//!     cargo run --example threaded

use std::sync::Arc;
use std::thread;

use blockheap::Allocator;
use tracing_subscriber::EnvFilter;

const WORKERS: u8 = 4;
const ROUNDS: usize = 500;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let heap = Arc::new(Allocator::with_capacity(100 * 1024)?);

    let workers: Vec<_> = (0..WORKERS)
        .map(|n| {
            let heap = Arc::clone(&heap);
            thread::spawn(move || {
                let mut stored = 0usize;
                for round in 0..ROUNDS {
                    let len = 8 + (round % 24);
                    let Ok(handle) = heap.store(&vec![n; len]) else {
                        continue;
                    };
                    let data = heap.retrieve(&handle).expect("live handle");
                    assert!(data.iter().all(|b| *b == n));
                    stored += heap.free(handle);
                }
                stored
            })
        })
        .collect();

    let mut total = 0;
    for (n, worker) in workers.into_iter().enumerate() {
        let stored = worker.join().expect("worker panicked");
        println!("worker {n}: stored and freed {stored} bytes");
        total += stored;
    }

    println!("\nTotal bytes cycled: {total}");
    println!("Blocks left: {}", heap.block_count());
    println!("Used: {}", heap.used());

    Ok(())
}
