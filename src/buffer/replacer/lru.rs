//! Generation-counter LRU (Least Recently Used) page replacement policy.
//!
//! Instead of an ordered list that needs splicing on every access (the
//! classic intrusive-linked-list LRU), each frame just records the value of
//! a monotonic generation counter at its last access. Eviction scans the
//! evictable set for the lowest generation. O(1) access recording, O(n)
//! eviction in the number of resident frames — cheap at buffer-pool sizes.

use std::collections::{HashMap, HashSet};

use crate::common::{FrameId, PageId};

pub struct LruReplacer {
    /// Generation stamp at each frame's most recent access.
    last_access: HashMap<FrameId, u64>,
    /// Frames currently eligible for eviction.
    evictable: HashSet<FrameId>,
    /// Monotonic counter, incremented on every `record_access`.
    generation: u64,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self {
            last_access: HashMap::new(),
            evictable: HashSet::new(),
            generation: 0,
        }
    }

    /// Record that a frame was accessed, refreshing its generation stamp.
    ///
    /// `page_id` isn't used by plain LRU but is accepted for parity with
    /// history-aware policies (LRU-K) that key on it.
    pub fn record_access(&mut self, frame_id: FrameId, _page_id: PageId) {
        self.generation += 1;
        self.last_access.insert(frame_id, self.generation);
    }

    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Evict the least-recently-accessed evictable frame.
    pub fn evict(&mut self) -> Option<FrameId> {
        let victim = *self
            .evictable
            .iter()
            .min_by_key(|fid| self.last_access.get(fid).copied().unwrap_or(0))?;
        self.evictable.remove(&victim);
        self.last_access.remove(&victim);
        Some(victim)
    }

    pub fn remove(&mut self, frame_id: FrameId) {
        self.evictable.remove(&frame_id);
        self.last_access.remove(&frame_id);
    }

    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}
