//! Transaction IDs, snapshots, and the visibility rule.
//!
//! Grounded on the global transaction table in `txn.c`: a monotonic ID
//! counter, a per-transaction snapshot of concurrently-active IDs, and an
//! `oldest_id` watermark swept forward as transactions finish so old
//! versions can eventually be reclaimed.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace};
use parking_lot::Mutex;

use crate::common::TxnId;

/// Degree of isolation a transaction runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    Snapshot,
}

/// One pending write, kept so `rollback` knows what to undo and `commit`
/// knows what to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// A single transaction's view of the world.
///
/// `snapshot` is the sorted set of transaction IDs that were active (and
/// therefore invisible) when this transaction started; anything committed
/// before `snap_min` or with an ID not in `snapshot` and below `snap_max`
/// is visible.
pub struct Txn {
    pub id: TxnId,
    pub isolation: IsolationLevel,
    snapshot: BTreeSet<u64>,
    snap_min: u64,
    snap_max: u64,
    pub ops: Vec<TxnOp>,
}

impl Txn {
    /// Whether `writer`'s update is visible to this transaction.
    pub fn is_visible(&self, writer: TxnId) -> bool {
        if writer == TxnId::NONE {
            return false;
        }
        if writer.is_aborted() {
            return false;
        }
        if writer == self.id {
            return true;
        }
        match self.isolation {
            IsolationLevel::ReadUncommitted => true,
            IsolationLevel::ReadCommitted | IsolationLevel::Snapshot => {
                if writer.0 >= self.snap_max {
                    false
                } else if writer.0 < self.snap_min {
                    true
                } else {
                    !self.snapshot.contains(&writer.0)
                }
            }
        }
    }
}

/// Process-wide transaction bookkeeping: ID allocation, the active-snapshot
/// table, and the oldest-ID watermark.
///
/// Mirrors `txn_global` in the original engine: `current` is the next ID to
/// hand out, `active` is the set of in-flight IDs (stand-in for the
/// per-session state array), and `oldest_id` is swept forward whenever a
/// transaction ends.
pub struct TxnManager {
    current: AtomicU64,
    active: Mutex<BTreeSet<u64>>,
    oldest_id: AtomicU64,
}

impl TxnManager {
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(1),
            active: Mutex::new(BTreeSet::new()),
            oldest_id: AtomicU64::new(1),
        }
    }

    /// A manager whose next allocated ID is past `max_seen` — used after
    /// recovery so a fresh transaction can never collide with one replayed
    /// from the log.
    pub fn resume_after(max_seen: TxnId) -> Self {
        let next = max_seen.0 + 1;
        Self {
            current: AtomicU64::new(next),
            active: Mutex::new(BTreeSet::new()),
            oldest_id: AtomicU64::new(next),
        }
    }

    pub fn oldest_id(&self) -> TxnId {
        TxnId::new(self.oldest_id.load(Ordering::Acquire))
    }

    /// Begin a new transaction, allocating its ID and taking its snapshot.
    pub fn begin(&self, isolation: IsolationLevel) -> Txn {
        let id = self.current.fetch_add(1, Ordering::AcqRel);
        let snap_max = id;

        let mut active = self.active.lock();
        let snapshot: BTreeSet<u64> = active.iter().copied().collect();
        let snap_min = snapshot.iter().copied().next().unwrap_or(snap_max);
        active.insert(id);
        drop(active);

        trace!("begin txn {id} snap_min={snap_min} snap_max={snap_max}");
        Txn {
            id: TxnId::new(id),
            isolation,
            snapshot,
            snap_min,
            snap_max,
            ops: Vec::new(),
        }
    }

    /// Release a transaction's ID from the active set (commit or abort)
    /// and sweep the oldest-ID watermark forward.
    pub fn release(&self, txn: &Txn) {
        self.active.lock().remove(&txn.id.0);
        self.update_oldest();
    }

    fn update_oldest(&self) {
        let active = self.active.lock();
        let current = self.current.load(Ordering::Acquire);
        let new_oldest = active.iter().copied().next().unwrap_or(current);
        let prev = self.oldest_id.swap(new_oldest, Ordering::AcqRel);
        if new_oldest != prev {
            debug!("oldest_id advanced {prev} -> {new_oldest}");
        }
    }

    /// Number of transactions currently active.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

impl Default for TxnManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Txn {
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(TxnOp::Put { key, value });
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(TxnOp::Delete { key });
    }
}
