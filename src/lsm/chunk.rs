//! A single chunk: one B-tree file composing an LSM tree, plus the
//! lifecycle flags the tree uses to decide what to do with it next.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::common::TxnId;
use crate::index::BTree;
use crate::lsm::bloom::BloomFilter;

/// Lifecycle flags for a chunk, matching the original engine's
/// on-disk/merging/stable/bloom-present bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkFlags {
    pub on_disk: bool,
    pub merging: bool,
    pub stable: bool,
    pub bloom_present: bool,
}

/// One chunk of an LSM tree: an independent B-tree covering some slice of
/// the tree's lifetime, plus an optional Bloom filter over its keys.
pub struct Chunk {
    pub id: u32,
    pub generation: u32,
    pub tree: Arc<BTree>,
    pub bloom: Option<BloomFilter>,
    pub create_timestamp: u64,
    /// Set when the tree switches away from this chunk as the writable
    /// one; a reader whose snapshot can't see this ID still reads it as
    /// the live chunk.
    pub switch_txn_id: TxnId,
    pub flags: ChunkFlags,
    refcnt: AtomicU32,
}

impl Chunk {
    pub fn new(id: u32, generation: u32, tree: Arc<BTree>) -> Self {
        let create_timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            id,
            generation,
            tree,
            bloom: None,
            create_timestamp,
            switch_txn_id: TxnId::NONE,
            flags: ChunkFlags::default(),
            refcnt: AtomicU32::new(0),
        }
    }

    pub fn pin(&self) {
        self.refcnt.fetch_add(1, Ordering::AcqRel);
    }

    pub fn unpin(&self) {
        self.refcnt.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn refcount(&self) -> u32 {
        self.refcnt.load(Ordering::Acquire)
    }

    /// A retired chunk is safe to drop once nothing still references it.
    pub fn is_droppable(&self) -> bool {
        self.refcount() == 0
    }

    /// Build (or rebuild) this chunk's Bloom filter over every key
    /// currently in its tree, sized for `n` expected items.
    pub fn build_bloom(&mut self, keys: impl Iterator<Item = Vec<u8>>, n: usize, bits_per_item: u32, num_hashes: u32) {
        let mut bloom = BloomFilter::new(n.max(1), bits_per_item, num_hashes);
        for key in keys {
            bloom.insert(&key);
        }
        self.bloom = Some(bloom);
        self.flags.bloom_present = true;
    }

    /// Whether `key` might be in this chunk, per its Bloom filter. A chunk
    /// with no filter yet must always be searched.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        match &self.bloom {
            Some(bloom) => bloom.may_contain(key),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPoolManager;
    use crate::storage::DiskManager;
    use tempfile::tempdir;

    fn make_chunk(id: u32) -> (Chunk, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("c.db")).unwrap();
        let bpm = Arc::new(BufferPoolManager::new(32, dm));
        let tree = Arc::new(BTree::create(bpm).unwrap());
        (Chunk::new(id, 0, tree), dir)
    }

    #[test]
    fn test_new_chunk_has_no_bloom() {
        let (chunk, _dir) = make_chunk(1);
        assert!(chunk.may_contain(b"anything"));
        assert!(!chunk.flags.bloom_present);
    }

    #[test]
    fn test_build_bloom_and_query() {
        let (mut chunk, _dir) = make_chunk(1);
        chunk.tree.insert(b"a".to_vec(), b"1".to_vec()).unwrap();
        chunk.tree.insert(b"b".to_vec(), b"2".to_vec()).unwrap();
        chunk.build_bloom(vec![b"a".to_vec(), b"b".to_vec()].into_iter(), 2, 16, 4);
        assert!(chunk.flags.bloom_present);
        assert!(chunk.may_contain(b"a"));
        assert!(chunk.may_contain(b"b"));
    }

    #[test]
    fn test_refcount_pin_unpin() {
        let (chunk, _dir) = make_chunk(1);
        assert!(chunk.is_droppable());
        chunk.pin();
        assert!(!chunk.is_droppable());
        chunk.unpin();
        assert!(chunk.is_droppable());
    }
}
