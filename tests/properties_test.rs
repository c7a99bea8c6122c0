//! Property tests for the allocator.
//!
//! Random sequences of store / free / in-place update / reallocating update /
//! clear are replayed against one heap and a plain shadow model of what each
//! live handle should contain. After every step:
//!
//! - blocks tile the buffer exactly (sizes sum to the capacity)
//! - no two neighbouring blocks are both free
//! - every live handle still reads back its shadow payload
//! - `used()` equals the sum of live payload lengths

use proptest::prelude::*;

use blockheap::{Allocator, BlockInfo, Handle};

const CAPACITY: usize = 512;

#[derive(Debug, Clone)]
enum Op {
    Store { len: usize, spare: usize, fill: u8 },
    Free { pick: usize },
    Patch { pick: usize, offset: usize, fill: u8 },
    Update { pick: usize, len: usize, fill: u8 },
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0usize..96, 0usize..16, any::<u8>())
            .prop_map(|(len, spare, fill)| Op::Store { len, spare, fill }),
        4 => any::<usize>().prop_map(|pick| Op::Free { pick }),
        2 => (any::<usize>(), 0usize..32, any::<u8>())
            .prop_map(|(pick, offset, fill)| Op::Patch { pick, offset, fill }),
        2 => (any::<usize>(), 0usize..96, any::<u8>())
            .prop_map(|(pick, len, fill)| Op::Update { pick, len, fill }),
        1 => Just(Op::Clear),
    ]
}

/// A live handle and the bytes its block should hold. Spare capacity past
/// the payload keeps whatever a previous block left there, so it is `None`
/// until patched.
struct Live {
    handle: Handle,
    expected: Vec<Option<u8>>,
}

fn known(payload: &[u8], size: usize) -> Vec<Option<u8>> {
    let mut expected: Vec<_> = payload.iter().copied().map(Some).collect();
    expected.resize(size, None);
    expected
}

fn check_layout(heap: &Allocator) -> Result<(), TestCaseError> {
    let blocks = heap.blocks();
    let total: usize = blocks.iter().map(|b| b.size()).sum();
    prop_assert_eq!(total, heap.capacity());

    for pair in blocks.windows(2) {
        prop_assert_eq!(pair[0].end, pair[1].start);
        prop_assert!(!(pair[0].free && pair[1].free), "adjacent free blocks");
    }
    prop_assert!(heap.check_invariants().is_ok());
    Ok(())
}

fn check_contents(heap: &Allocator, live: &[Live]) -> Result<(), TestCaseError> {
    for entry in live {
        let data = heap.retrieve(&entry.handle).unwrap();
        prop_assert_eq!(data.len(), entry.expected.len());
        for (actual, expected) in data.iter().zip(&entry.expected) {
            if let Some(expected) = expected {
                prop_assert_eq!(actual, expected);
            }
        }
    }
    let used: usize = live.iter().map(|e| e.handle.payload_len()).sum();
    prop_assert_eq!(heap.used(), used);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_random_ops_keep_invariants(ops in prop::collection::vec(op(), 1..80)) {
        let heap = Allocator::with_capacity(CAPACITY).unwrap();
        let mut live: Vec<Live> = Vec::new();

        for op in ops {
            match op {
                Op::Store { len, spare, fill } => {
                    let payload = vec![fill; len];
                    let before = heap.blocks();
                    match heap.store_with_capacity(&payload, len + spare) {
                        Ok(handle) => {
                            let expected = known(&payload, len + spare);
                            live.push(Live { handle, expected });
                        }
                        Err(err) => {
                            prop_assert!(err.is_overflow());
                            prop_assert!(heap.largest_free() <= len + spare);
                            prop_assert_eq!(heap.blocks(), before);
                        }
                    }
                }
                Op::Free { pick } if !live.is_empty() => {
                    let entry = live.swap_remove(pick % live.len());
                    let len = entry.handle.payload_len();
                    prop_assert_eq!(heap.free(entry.handle), len);
                }
                Op::Patch { pick, offset, fill } if !live.is_empty() => {
                    let index = pick % live.len();
                    let entry = &mut live[index];
                    let size = entry.handle.size();
                    let patch = vec![fill; 4];
                    let result = heap.update_in_place(&entry.handle, &patch, offset);
                    if offset + patch.len() <= size {
                        prop_assert!(result.is_ok());
                        for (slot, byte) in entry.expected[offset..].iter_mut().zip(&patch) {
                            *slot = Some(*byte);
                        }
                    } else {
                        prop_assert!(result.unwrap_err().is_bounds_exceeded());
                    }
                }
                Op::Update { pick, len, fill } if !live.is_empty() => {
                    let entry = live.swap_remove(pick % live.len());
                    let payload = vec![fill; len];
                    if let Ok(handle) = heap.update(entry.handle, &payload) {
                        let expected = known(&payload, len);
                        live.push(Live { handle, expected });
                    }
                }
                Op::Clear => {
                    heap.clear();
                    for entry in live.drain(..) {
                        prop_assert!(!entry.handle.is_live());
                    }
                    prop_assert_eq!(heap.block_count(), 1);
                }
                _ => {}
            }

            check_layout(&heap)?;
            check_contents(&heap, &live)?;
        }

        for entry in live.drain(..) {
            heap.free(entry.handle);
        }
        prop_assert_eq!(heap.used(), 0);
        prop_assert_eq!(heap.block_count(), 1);
    }

    #[test]
    fn prop_round_trip(payload in prop::collection::vec(any::<u8>(), 0..CAPACITY)) {
        let heap = Allocator::with_capacity(CAPACITY).unwrap();
        let handle = heap.store(&payload).unwrap();
        prop_assert_eq!(&heap.retrieve(&handle).unwrap()[..], &payload[..]);
        prop_assert_eq!(heap.used(), payload.len());
    }

    #[test]
    fn prop_interior_hole_keeps_last_byte(
        (hole, split) in (3usize..64).prop_flat_map(|hole| (Just(hole), 1..hole - 1))
    ) {
        let heap = Allocator::with_capacity(2 * hole + 16).unwrap();
        let _left = heap.store(&[1; 8]).unwrap();
        let middle = heap.store(&vec![2; hole]).unwrap();
        let _right = heap.store(&[3; 8]).unwrap();
        heap.free(middle);

        // an exact fit never succeeds between two used blocks
        prop_assert!(heap.store(&vec![4; hole]).unwrap_err().is_overflow());

        // payloads summing to hole - 1 fill it, the last byte stays free
        let a = heap.store(&vec![5; split]).unwrap();
        let b = heap.store(&vec![6; hole - 1 - split]).unwrap();
        prop_assert_eq!(a.start(), 8);
        prop_assert_eq!(b.start(), 8 + split);
        prop_assert_eq!(
            heap.blocks()[3],
            BlockInfo { start: 8 + hole - 1, end: 8 + hole, free: true }
        );
        prop_assert!(heap.check_invariants().is_ok());
    }

    #[test]
    fn prop_reuse_after_free(split in 1usize..63) {
        let heap = Allocator::with_capacity(65).unwrap();
        let whole = heap.store(&[1; 64]).unwrap();
        heap.free(whole);

        let left = heap.store(&vec![2; split]).unwrap();
        let right = heap.store(&vec![3; 64 - split]).unwrap();
        prop_assert_eq!(left.start(), 0);
        prop_assert_eq!(right.start(), split);
        prop_assert_eq!(heap.used(), 64);
    }
}
