//! Common test utilities for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;

use chunkdex::{Index, IngestOptions, Placement, Record, SyncPolicy};

/// Options with a small rotation threshold and no fsync.
pub fn small_chunks(chunk_size_bytes: u64) -> IngestOptions {
    IngestOptions::default()
        .chunk_size_bytes(chunk_size_bytes)
        .sync_policy(SyncPolicy::Disabled)
}

/// Elements `[seed, seed + 1, ...]` laid out in `shape`.
pub fn f32_record(seed: u32, shape: &[usize]) -> Record {
    let len: usize = shape.iter().product();
    let values: Vec<f32> = (0..len).map(|i| (seed as usize + i) as f32).collect();
    Record::from_elements(&values, shape.to_vec())
        .expect("element count matches shape")
        .with_metadata("id", i64::from(seed))
}

/// Record of `1..=max_elems` elements with a seeded random 1-D shape.
pub fn random_record(rng: &mut fastrand::Rng, seed: u32, max_elems: usize) -> Record {
    let len = rng.usize(1..=max_elems);
    f32_record(seed, &[len])
}

/// Panic if any two placements in one chunk overlap.
pub fn assert_disjoint(index: &Index) {
    let mut by_chunk: BTreeMap<&str, Vec<&Placement>> = BTreeMap::new();
    for row in index.rows() {
        by_chunk
            .entry(row.placement.chunk_name.as_str())
            .or_default()
            .push(&row.placement);
    }
    for (chunk, mut placements) in by_chunk {
        placements.sort_by_key(|p| p.offset_bytes);
        for pair in placements.windows(2) {
            assert!(
                pair[0].end() <= pair[1].offset_bytes,
                "overlapping placements in {chunk}: {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }
}

/// The `id` metadata value of every row, sorted.
pub fn sorted_ids(index: &Index) -> Vec<i64> {
    let mut ids: Vec<i64> = (0..index.len())
        .map(|row| {
            index.metadata(row).expect("row in range")["id"]
                .as_i64()
                .expect("integer id")
        })
        .collect();
    ids.sort_unstable();
    ids
}
