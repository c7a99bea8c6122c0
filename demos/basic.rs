//! Basic single-threaded usage: store, read, patch, reallocate, free.
//!
//! Run with:
//!     RUST_LOG=blockheap=debug cargo run --example basic

use blockheap::{Allocator, ByteOrder, HeapConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = HeapConfig::new(4096)?
        .with_buffer_id(7)
        .with_byte_order(ByteOrder::LittleEndian);
    let heap = Allocator::new(config)?;

    println!("Created heap of {} bytes\n", heap.capacity());

    let greeting = heap.store(b"hello, heap")?;
    let counter = heap.store(&[0; 8])?;
    println!("greeting -> {greeting}");
    println!("counter  -> {counter}");

    // Typed access uses the configured byte order
    for _ in 0..3 {
        let n = heap.retrieve_u64(&counter, 0)?;
        heap.update_u64(&counter, 0, n + 1)?;
    }
    println!("counter value: {}", heap.retrieve_u64(&counter, 0)?);

    // Same-size rewrite keeps the block
    heap.update_in_place(&greeting, b"HELLO", 0)?;
    println!(
        "greeting: {}",
        String::from_utf8_lossy(&heap.retrieve(&greeting)?)
    );

    // A longer payload needs a new block
    let greeting = heap.update(greeting, b"hello again, a bit longer this time")?;
    println!("greeting moved -> {greeting}\n");

    println!("Layout:");
    for block in heap.blocks() {
        println!("  {block}");
    }
    println!(
        "\nused={} free={} largest_free={}",
        heap.used(),
        heap.free_bytes(),
        heap.largest_free()
    );

    heap.free(greeting);
    heap.free(counter);
    println!("After free: {} block(s), used={}", heap.block_count(), heap.used());

    Ok(())
}
