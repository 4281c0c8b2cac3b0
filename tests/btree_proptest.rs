//! Property tests for the B-tree index: for any sequence of inserts and
//! deletes, point lookups must agree with a reference `BTreeMap` model.

use std::collections::BTreeMap;
use std::sync::Arc;

use interchangedb::buffer::BufferPoolManager;
use interchangedb::index::BTree;
use interchangedb::storage::DiskManager;
use proptest::prelude::*;
use tempfile::tempdir;

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u8),
    Delete(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<u8>(), any::<u8>()).prop_map(|(k, v)| Op::Put(k, v)),
        any::<u8>().prop_map(Op::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn btree_matches_reference_map(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("prop.db")).unwrap();
        let bpm = Arc::new(BufferPoolManager::new(64, dm));
        let tree = BTree::create(bpm).unwrap();
        let mut model: BTreeMap<u8, u8> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    tree.insert(vec![k], vec![v]).unwrap();
                    model.insert(k, v);
                }
                Op::Delete(k) => {
                    let existed = model.remove(&k).is_some();
                    let result = tree.delete(&[k]);
                    prop_assert_eq!(result.is_ok(), existed);
                }
            }
        }

        for k in 0u8..=255 {
            let expected = model.get(&k).map(|v| vec![*v]);
            prop_assert_eq!(tree.search(&[k]).unwrap(), expected);
        }
    }
}
