//! Lookaside table: off-page storage for updates that can't be reconciled
//! onto a page image directly (a page being evicted while a reader still
//! needs an older, not-yet-globally-visible version of a value).
//!
//! Keyed by the page the update was evicted from plus the record key, so a
//! page read can consult it for entries belonging to that page without
//! scanning the whole table.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::common::{Lsn, PageId, TxnId};

/// Identifies the page and logical key a lookaside entry was evicted from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookasideKey {
    pub page_id: PageId,
    pub key: Vec<u8>,
}

/// One off-page update, carrying enough MVCC metadata for a reader to
/// decide whether it's visible to their snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookasideEntry {
    pub txn_id: TxnId,
    pub lsn: Lsn,
    pub value: Option<Vec<u8>>,
}

/// A table of evicted, not-yet-reconciled updates.
///
/// Entries for a key are kept in insertion order (oldest first), mirroring
/// the page's own update chain, so a reader walks them the same way it
/// would walk an in-memory update skiplist.
#[derive(Default)]
pub struct LookasideTable {
    entries: RwLock<HashMap<LookasideKey, Vec<LookasideEntry>>>,
}

impl LookasideTable {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert an evicted update for `key` on `page_id`.
    pub fn insert(&self, page_id: PageId, key: Vec<u8>, entry: LookasideEntry) {
        let lookaside_key = LookasideKey { page_id, key };
        self.entries.write().entry(lookaside_key).or_default().push(entry);
    }

    /// Fetch every recorded update for `key` on `page_id`, oldest first.
    pub fn lookup(&self, page_id: PageId, key: &[u8]) -> Vec<LookasideEntry> {
        let lookaside_key = LookasideKey {
            page_id,
            key: key.to_vec(),
        };
        self.entries
            .read()
            .get(&lookaside_key)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every entry associated with `page_id`, once its updates have
    /// all been reconciled back into a page image on disk.
    pub fn clear_page(&self, page_id: PageId) {
        self.entries.write().retain(|k, _| k.page_id != page_id);
    }

    /// Remove entries whose LSN is at or below `checkpoint_lsn`: no
    /// transaction started after the checkpoint can need them, since
    /// their content is now captured in the checkpointed page image.
    pub fn prune_before(&self, checkpoint_lsn: Lsn) {
        let mut entries = self.entries.write();
        for list in entries.values_mut() {
            list.retain(|e| e.lsn > checkpoint_lsn);
        }
        entries.retain(|_, list| !list.is_empty());
    }

    pub fn len(&self) -> usize {
        self.entries.read().values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
