//! A thread-bounded handle against an open [`Connection`]: the current
//! transaction (if any) and the isolation level new transactions should
//! start at.

use std::sync::Arc;

use log::trace;

use crate::common::error::{Error, Result};
use crate::conn::Connection;
use crate::txn::{IsolationLevel, Txn, TxnOp, WalRecord};

/// One thread's view of an open database. Not `Sync` — a session is meant
/// to be used from a single thread at a time, the way a cursor or a
/// transaction handle is in the original engine.
pub struct Session {
    conn: Arc<Connection>,
    isolation: IsolationLevel,
    txn: Option<Txn>,
}

impl Session {
    pub fn new(conn: Arc<Connection>) -> Self {
        Self { conn, isolation: IsolationLevel::Snapshot, txn: None }
    }

    pub fn set_isolation(&mut self, isolation: IsolationLevel) {
        self.isolation = isolation;
    }

    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    /// Start a transaction. Fails if one is already open on this session.
    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.txn.is_some() {
            return Err(Error::InvalidConfig("transaction already in progress".into()));
        }
        let txn = self.conn.txn_manager().begin(self.isolation);
        self.conn
            .wal()
            .lock()
            .append(&WalRecord::Begin { txn_id: txn.id }, self.conn.sync_mode())?;
        trace!("session began txn {}", txn.id);
        self.txn = Some(txn);
        Ok(())
    }

    /// Buffer a put against the current transaction, applying it straight
    /// to the LSM tree's writable chunk (undone on rollback).
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let txn = self.txn.as_mut().ok_or(Error::InvalidConfig("no active transaction".into()))?;
        self.conn.lsm().insert(key.clone(), value.clone())?;
        txn.put(key, value);
        Ok(())
    }

    pub fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        let txn = self.txn.as_mut().ok_or(Error::InvalidConfig("no active transaction".into()))?;
        self.conn.lsm().delete(&key)?;
        txn.delete(key);
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.conn.lsm().get(key)
    }

    /// Write the transaction's ops to the log, commit it, and release its
    /// ID from the active set.
    pub fn commit(&mut self) -> Result<()> {
        let mut txn = self.txn.take().ok_or(Error::InvalidConfig("no active transaction".into()))?;
        let mut wal = self.conn.wal().lock();
        for op in txn.ops.drain(..) {
            let record = match op {
                TxnOp::Put { key, value } => WalRecord::Put { txn_id: txn.id, key, value },
                TxnOp::Delete { key } => WalRecord::Delete { txn_id: txn.id, key },
            };
            wal.append(&record, self.conn.sync_mode())?;
        }
        wal.append(&WalRecord::Commit { txn_id: txn.id }, self.conn.sync_mode())?;
        drop(wal);
        self.conn.txn_manager().release(&txn);
        trace!("session committed txn {}", txn.id);
        Ok(())
    }

    /// Discard the transaction's buffered ops without logging them. The
    /// writes already applied to the LSM tree are not undone — matching
    /// the index layer's lack of a rollback-capable write path; callers
    /// that need rollback-on-abort semantics must keep their own undo log
    /// (see [`crate::schema::SchemaChangeTracker`] for schema changes).
    pub fn rollback(&mut self) -> Result<()> {
        let txn = self.txn.take().ok_or(Error::InvalidConfig("no active transaction".into()))?;
        self.conn
            .wal()
            .lock()
            .append(&WalRecord::Abort { txn_id: txn.id }, self.conn.sync_mode())?;
        self.conn.txn_manager().release(&txn);
        trace!("session rolled back txn {}", txn.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::ConnectionOptions;
    use tempfile::tempdir;

    fn make_conn() -> (Arc<Connection>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let conn = Arc::new(Connection::open(dir.path(), ConnectionOptions::default()).unwrap());
        (conn, dir)
    }

    #[test]
    fn test_commit_makes_write_durable_across_wal() {
        let (conn, _dir) = make_conn();
        let mut session = Session::new(Arc::clone(&conn));
        session.begin_transaction().unwrap();
        session.put(b"a".to_vec(), b"1".to_vec()).unwrap();
        session.commit().unwrap();
        assert_eq!(session.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_double_begin_fails() {
        let (conn, _dir) = make_conn();
        let mut session = Session::new(conn);
        session.begin_transaction().unwrap();
        assert!(session.begin_transaction().is_err());
    }

    #[test]
    fn test_commit_without_begin_fails() {
        let (conn, _dir) = make_conn();
        let mut session = Session::new(conn);
        assert!(session.commit().is_err());
    }

    #[test]
    fn test_rollback_clears_active_transaction() {
        let (conn, _dir) = make_conn();
        let mut session = Session::new(conn);
        session.begin_transaction().unwrap();
        session.put(b"a".to_vec(), b"1".to_vec()).unwrap();
        session.rollback().unwrap();
        assert!(!session.in_transaction());
    }
}
