//! LSM end-to-end scenarios: merge preserves the key set, and Bloom
//! filters behave correctly after a flush.

use std::sync::Arc;

use interchangedb::buffer::BufferPoolManager;
use interchangedb::common::TxnId;
use interchangedb::lsm::{LsmOptions, LsmTree};
use interchangedb::storage::DiskManager;
use tempfile::tempdir;

fn make_lsm(options: LsmOptions) -> (LsmTree, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("lsm.db")).unwrap();
    let bpm = Arc::new(BufferPoolManager::new(256, dm));
    (LsmTree::create(bpm, options).unwrap(), dir)
}

/// S5 — LSM merge preserves set: all 1000 keys survive several switches and
/// a merge, and the chunk array shrinks.
#[test]
fn test_lsm_merge_preserves_key_set() {
    let options = LsmOptions { merge_min: 2, merge_max: 4, ..Default::default() };
    let (lsm, _dir) = make_lsm(options);

    for i in 0..1000u32 {
        lsm.insert(format!("{i:03}").into_bytes(), i.to_be_bytes().to_vec()).unwrap();
        if i % 100 == 99 {
            lsm.switch(TxnId::new(i as u64)).unwrap();
        }
    }

    let before = lsm.chunk_count();
    let window = lsm.select_merge_window().expect("a mergeable window must exist");
    let window_len = window.len();
    lsm.merge(&window).unwrap();
    assert!(lsm.chunk_count() < before);

    for i in 0..1000u32 {
        assert_eq!(
            lsm.get(format!("{i:03}").as_bytes()).unwrap(),
            Some(i.to_be_bytes().to_vec())
        );
    }
    assert!(window_len >= 2);
}

/// S6 — Bloom filter correctness: every inserted key reports present after
/// flush, and the false-positive rate over random absent keys stays low.
#[test]
fn test_bloom_filter_after_flush() {
    let options = LsmOptions::default();
    let (lsm, _dir) = make_lsm(options);

    for i in 0..1000u32 {
        lsm.insert(i.to_be_bytes().to_vec(), i.to_be_bytes().to_vec()).unwrap();
    }
    lsm.switch(TxnId::new(1)).unwrap();
    lsm.flush(1, 1000).unwrap();

    for i in 0..1000u32 {
        assert_eq!(lsm.bloom_get(1, &i.to_be_bytes()), Some(true));
    }

    // Random non-present keys: false positives should be rare.
    let mut false_positives = 0u32;
    let sample = 10_000u32;
    for i in 0..sample {
        let candidate = (i + 10_000_000).to_be_bytes();
        if lsm.bloom_get(1, &candidate) == Some(true) {
            false_positives += 1;
        }
    }
    assert!(
        (false_positives as f64 / sample as f64) < 0.05,
        "false positive rate too high: {false_positives}/{sample}"
    );
}
