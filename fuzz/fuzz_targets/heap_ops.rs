#![no_main]

use libfuzzer_sys::fuzz_target;
use blockheap::{Allocator, Handle};

fuzz_target!(|data: &[u8]| {
    let heap = Allocator::with_capacity(1024).unwrap();
    let mut live: Vec<(Handle, u8)> = Vec::new();

    // Each op is two bytes: opcode and argument
    for (step, op) in data.chunks_exact(2).enumerate() {
        let fill = step as u8;
        let arg = op[1] as usize;

        match op[0] % 5 {
            0 | 1 => {
                if let Ok(handle) = heap.store(&vec![fill; arg]) {
                    live.push((handle, fill));
                }
            }
            2 if !live.is_empty() => {
                let (handle, _) = live.swap_remove(arg % live.len());
                let len = handle.payload_len();
                assert_eq!(heap.free(handle), len);
            }
            3 if !live.is_empty() => {
                let index = arg % live.len();
                let (handle, _) = live.swap_remove(index);
                if let Ok(handle) = heap.update(handle, &vec![fill; arg / 2]) {
                    live.push((handle, fill));
                }
            }
            4 if arg == 0 => {
                heap.clear();
                for (handle, _) in live.drain(..) {
                    assert!(!handle.is_live());
                }
            }
            _ => {}
        }

        // Verify: layout stays a tiling with coalesced free space
        heap.check_invariants().unwrap();

        // Verify: live payloads are intact
        for (handle, fill) in &live {
            let data = heap.retrieve(handle).unwrap();
            assert!(data.iter().all(|b| b == fill));
        }

        let used: usize = live.iter().map(|(h, _)| h.payload_len()).sum();
        assert_eq!(heap.used(), used);
    }
});
