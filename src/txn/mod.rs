//! Transactions, the write-ahead log, and crash recovery.
//!
//! [`manager`] implements transaction IDs, per-transaction snapshots, and
//! the visibility rule used to decide which writes a reader can see.
//! [`wal`] is the on-disk log format and durability modes a commit can
//! request. [`recovery`] replays a log's committed transactions after a
//! crash.

pub mod manager;
pub mod recovery;
pub mod wal;

pub use manager::{IsolationLevel, Txn, TxnManager, TxnOp};
pub use recovery::{recover, max_txn_id, RecoveryReport};
pub use wal::{SyncMode, Wal, WalRecord};
