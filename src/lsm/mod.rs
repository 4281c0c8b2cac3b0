//! LSM orchestration: a log-structured merge tree of chunks (each chunk a
//! B-tree) layered under a single ordered key space.
//!
//! Grounded on `examples/original_source/src/lsm/lsm_tree.c`,
//! `lsm_merge.c`, `lsm_manager.c`, and `src/bloom/bloom.c`.

pub mod bloom;
pub mod chunk;

pub use bloom::BloomFilter;
pub use chunk::{Chunk, ChunkFlags};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use parking_lot::{Mutex, RwLock};

use crate::buffer::BufferPoolManager;
use crate::common::error::Result;
use crate::common::TxnId;
use crate::index::BTree;

/// Tuning knobs for merge-window selection and throttling.
#[derive(Debug, Clone, Copy)]
pub struct LsmOptions {
    pub merge_min: usize,
    pub merge_max: usize,
    pub chunk_max_size: u64,
    pub max_generation_gap: u32,
    pub checkpoint_threshold: usize,
    pub time_per_record: Duration,
}

impl Default for LsmOptions {
    fn default() -> Self {
        Self {
            merge_min: 4,
            merge_max: 8,
            chunk_max_size: 64 * 1024 * 1024,
            max_generation_gap: 4,
            checkpoint_threshold: 4,
            time_per_record: Duration::from_micros(1),
        }
    }
}

/// One unit of background work the manager thread dispatches to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkUnit {
    /// Switch the tree to a fresh writable chunk.
    Switch,
    /// Checkpoint an in-memory chunk to disk and build its Bloom filter.
    Flush { chunk_id: u32 },
    /// Merge a contiguous window of chunks into one new chunk.
    Merge { chunk_ids: Vec<u32> },
    /// Physically remove a retired chunk whose files are unreferenced.
    Drop { chunk_id: u32 },
}

/// An LSM tree: an ordered array of live chunks (newest first) plus a list
/// of retired chunks awaiting drop once no reader can still reference
/// them.
pub struct LsmTree {
    bpm: Arc<BufferPoolManager>,
    options: LsmOptions,
    chunks: RwLock<Vec<Chunk>>,
    retired: Mutex<Vec<Chunk>>,
    next_chunk_id: AtomicU64,
    next_generation: AtomicU64,
    merge_throttle_micros: AtomicU64,
}

impl LsmTree {
    /// Create a new tree with a single empty writable chunk.
    pub fn create(bpm: Arc<BufferPoolManager>, options: LsmOptions) -> Result<Self> {
        let tree = Arc::new(BTree::create(Arc::clone(&bpm))?);
        let chunk = Chunk::new(0, 0, tree);
        Ok(Self {
            bpm,
            options,
            chunks: RwLock::new(vec![chunk]),
            retired: Mutex::new(Vec::new()),
            next_chunk_id: AtomicU64::new(1),
            next_generation: AtomicU64::new(1),
            merge_throttle_micros: AtomicU64::new(0),
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn retired_count(&self) -> usize {
        self.retired.lock().len()
    }

    /// Point lookup: search the writable chunk first, then each read-only
    /// chunk oldest-to-newest-is-wrong — newest-to-oldest, since a later
    /// chunk's write shadows an earlier one's.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let chunks = self.chunks.read();
        for chunk in chunks.iter() {
            if !chunk.may_contain(key) {
                continue;
            }
            if let Some(value) = chunk.tree.search(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Insert into the tree's current writable chunk (chunk 0).
    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let chunks = self.chunks.read();
        chunks[0].tree.insert(key, value)
    }

    /// Delete from the tree's current writable chunk. Older, already-flushed
    /// chunks still containing `key` are shadowed rather than rewritten.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let chunks = self.chunks.read();
        chunks[0].tree.delete(key)
    }

    /// The writable chunk's underlying tree, for recovery replay.
    pub fn current_tree(&self) -> Arc<BTree> {
        Arc::clone(&self.chunks.read()[0].tree)
    }

    /// Query the Bloom filter of the chunk at `chunk_index` directly,
    /// without touching its tree. Returns `None` if that chunk has no
    /// filter built yet (it must be searched unconditionally).
    pub fn bloom_get(&self, chunk_index: usize, key: &[u8]) -> Option<bool> {
        self.chunks.read()[chunk_index].bloom.as_ref().map(|b| b.may_contain(key))
    }

    /// Switch the tree to a fresh writable chunk. Under the tree's
    /// write-lock: allocate a new id, append the new chunk, and stamp the
    /// previous writable chunk with the switch transaction ID so readers
    /// without that ID in view still treat it as live.
    pub fn switch(&self, switch_txn_id: TxnId) -> Result<u32> {
        let new_tree = Arc::new(BTree::create(Arc::clone(&self.bpm))?);
        let id = self.next_chunk_id.fetch_add(1, Ordering::AcqRel) as u32;
        let generation = self.next_generation.fetch_add(1, Ordering::AcqRel) as u32;
        let mut new_chunk = Chunk::new(id, generation, new_tree);

        let mut chunks = self.chunks.write();
        chunks[0].switch_txn_id = switch_txn_id;
        std::mem::swap(&mut new_chunk, &mut chunks[0]);
        chunks.insert(1, new_chunk);
        info!("lsm tree switched, new writable chunk {id}, {} chunks live", chunks.len());
        Ok(id)
    }

    /// Mark a chunk on-disk and build its Bloom filter over its current
    /// keys, sized for `expected_items`.
    pub fn flush(&self, chunk_index: usize, expected_items: usize) -> Result<()> {
        let mut chunks = self.chunks.write();
        let chunk = &mut chunks[chunk_index];
        let keys = collect_keys(&chunk.tree)?;
        chunk.build_bloom(keys.into_iter(), expected_items, 16, 4);
        chunk.flags.on_disk = true;
        debug!("flushed chunk {} ({} keys)", chunk.id, expected_items);
        Ok(())
    }

    /// Select a contiguous window of chunks (indices into the current
    /// chunk array, oldest-first within the window) obeying the merge
    /// policy: `merge_min <= |window| <= merge_max`, accumulated size
    /// bounded by `chunk_max_size`, generation spread bounded by
    /// `max_generation_gap`.
    pub fn select_merge_window(&self) -> Option<Vec<usize>> {
        let chunks = self.chunks.read();
        // Chunk 0 is always the writable chunk; only read-only chunks merge.
        let candidates = &chunks[1..];
        if candidates.len() < self.options.merge_min {
            return None;
        }

        for start in 0..candidates.len() {
            let mut window = Vec::new();
            let mut total_size: u64 = 0;
            let base_generation = candidates[start].generation;
            for (offset, chunk) in candidates[start..].iter().enumerate() {
                if window.len() >= self.options.merge_max {
                    break;
                }
                let gap = base_generation.abs_diff(chunk.generation);
                if gap > self.options.max_generation_gap {
                    break;
                }
                // Approximate a chunk's "size" as bloom bit count, falling
                // back to a nominal unit so an unflushed chunk still counts.
                let size = chunk.bloom.as_ref().map(|b| b.num_bits() / 8).unwrap_or(4096);
                if total_size + size > self.options.chunk_max_size && window.len() >= self.options.merge_min {
                    break;
                }
                total_size += size;
                window.push(start + 1 + offset);
            }
            if window.len() >= self.options.merge_min {
                return Some(window);
            }
        }
        None
    }

    /// Merge the chunks at `window` (indices into the live chunk array)
    /// into one new chunk, retiring the originals.
    pub fn merge(&self, window: &[usize]) -> Result<u32> {
        let new_tree = Arc::new(BTree::create(Arc::clone(&self.bpm))?);
        let id = self.next_chunk_id.fetch_add(1, Ordering::AcqRel) as u32;
        let max_generation = {
            let chunks = self.chunks.read();
            window.iter().map(|&i| chunks[i].generation).max().unwrap_or(0)
        };

        {
            let chunks = self.chunks.read();
            // Merge oldest-to-newest within the window so newer writes
            // overwrite older ones for duplicate keys, matching `get`'s
            // newest-first shadowing.
            for &idx in window.iter().rev() {
                for (key, value) in dump_entries(&chunks[idx].tree)? {
                    new_tree.insert(key, value)?;
                }
            }
        }

        let mut merged = Chunk::new(id, max_generation, new_tree);
        merged.flags.on_disk = true;
        merged.flags.stable = true;

        let mut chunks = self.chunks.write();
        let mut retired = Vec::new();
        for &idx in window.iter().rev() {
            retired.push(chunks.remove(idx));
        }
        let insert_at = window[0];
        chunks.insert(insert_at, merged);
        drop(chunks);

        self.retired.lock().extend(retired);
        info!("merged {} chunk(s) into chunk {id}", window.len());
        Ok(id)
    }

    /// Physically drop every retired chunk no active reader can still
    /// reference.
    pub fn drop_retired(&self) -> usize {
        let mut retired = self.retired.lock();
        let before = retired.len();
        retired.retain(|c| !c.is_droppable());
        before - retired.len()
    }

    /// Checkpoint throttle: proportional to in-memory chunk count above
    /// `checkpoint_threshold`, scaled by the configured per-record time
    /// estimate. Applied by stalling inserts for the returned duration.
    pub fn checkpoint_throttle(&self) -> Duration {
        let count = self.chunk_count();
        let over = count.saturating_sub(self.options.checkpoint_threshold);
        self.options.time_per_record * over as u32
    }

    /// Merge throttle: grows by `1/merge_max` whenever generation-0 chunk
    /// count exceeds `2*merge_min`, shrinks otherwise. Bounded at 1 second.
    pub fn update_merge_throttle(&self) -> Duration {
        let gen0_count = self.chunks.read().iter().filter(|c| c.generation == 0).count();
        let step_micros = 1_000_000u64 / self.options.merge_max as u64;
        let current = self.merge_throttle_micros.load(Ordering::Acquire);
        let updated = if gen0_count > 2 * self.options.merge_min {
            (current + step_micros).min(1_000_000)
        } else {
            current.saturating_sub(step_micros)
        };
        self.merge_throttle_micros.store(updated, Ordering::Release);
        Duration::from_micros(updated)
    }
}

fn collect_keys(tree: &BTree) -> Result<Vec<Vec<u8>>> {
    Ok(dump_entries(tree)?.into_iter().map(|(k, _)| k).collect())
}

/// Walk every entry in `tree` via repeated successor lookups. A stand-in
/// for a proper range-cursor, adequate for building a Bloom filter or
/// streaming a merge without needing the cursor API this crate doesn't
/// expose yet.
fn dump_entries(tree: &BTree) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    crate::index::btree::collect_all(tree)
}
