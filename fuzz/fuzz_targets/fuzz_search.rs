#![no_main]

use libfuzzer_sys::fuzz_target;
use newsindex::vector::{FlatIndex, IndexEntry};

// Raw float bytes, including NaN and infinities, must never panic the
// brute-force index or break its ordering and bounds.
fuzz_target!(|data: &[u8]| {
    const DIM: usize = 4;
    let floats: Vec<f32> = data
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if floats.len() < DIM {
        return;
    }

    let (query, rest) = floats.split_at(DIM);
    let index = FlatIndex::new();
    for (i, row) in rest.chunks_exact(DIM).enumerate() {
        index.insert(IndexEntry::new(i.to_string(), String::new(), row.to_vec()));
    }

    let k = data[0] as usize % 8;
    let results = index.query(query, k);
    assert_eq!(results.len(), k.min(index.len()));
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for result in &results {
        assert!((-1.0..=1.0).contains(&result.score));
    }
});
