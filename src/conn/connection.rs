//! The process-wide handle on an open database: the buffer pool, the
//! write-ahead log, the metadata table, and the LSM tree all live here,
//! shared by every [`Session`](crate::conn::Session) opened against it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::config::DEFAULT_POOL_SIZE;
use crate::common::error::Result;
use crate::lsm::{LsmOptions, LsmTree};
use crate::schema::{MetadataTable, TurtleRecord};
use crate::storage::DiskManager;
use crate::txn::{SyncMode, TxnManager, Wal};

/// Options controlling how a [`Connection`] is opened.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub pool_size: usize,
    pub sync_mode: SyncMode,
    pub lsm: LsmOptions,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            sync_mode: SyncMode::Flush,
            lsm: LsmOptions::default(),
        }
    }
}

/// An open database. Owns every shared subsystem; cheap to clone behind
/// an `Arc` since each `Session` only borrows it.
pub struct Connection {
    bpm: Arc<BufferPoolManager>,
    wal: Mutex<Wal>,
    txn_manager: Arc<TxnManager>,
    metadata: Arc<MetadataTable>,
    lsm: Arc<LsmTree>,
    sync_mode: SyncMode,
    turtle_path: PathBuf,
}

impl Connection {
    /// Open (creating if absent) a database rooted at `dir`, made up of
    /// `<dir>/db` (the block-managed file), `<dir>/wal` (the log), and
    /// `<dir>/db.turtle` (the bootstrap record).
    pub fn open<P: AsRef<Path>>(dir: P, options: ConnectionOptions) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join("db");
        let wal_path = dir.join("wal");
        let turtle_path = dir.join("db.turtle");

        let first_open = !db_path.exists();
        let dm = DiskManager::open_or_create(&db_path)?;
        let bpm = Arc::new(BufferPoolManager::new(options.pool_size, dm));

        let metadata = if first_open {
            info!("initializing new database at {}", dir.display());
            let table = MetadataTable::create(Arc::clone(&bpm))?;
            TurtleRecord::new(table.root_page_id()).write(&turtle_path)?;
            table
        } else {
            let turtle = TurtleRecord::read(&turtle_path)?;
            debug!("reopening database, metadata root = {}", turtle.metadata_root);
            MetadataTable::open(Arc::clone(&bpm), turtle.metadata_root)
        };

        let lsm = Arc::new(LsmTree::create(Arc::clone(&bpm), options.lsm)?);

        let mut wal = Wal::open(&wal_path)?;
        let report = crate::txn::recover(&mut wal, &lsm.current_tree())?;
        if report.records_scanned > 0 {
            info!(
                "recovery scanned {} wal record(s), replayed {} op(s) from {} committed txn(s)",
                report.records_scanned, report.ops_replayed, report.txns_committed
            );
        }
        let max_seen = crate::txn::max_txn_id(&mut wal)?;
        let txn_manager = Arc::new(TxnManager::resume_after(max_seen));

        Ok(Self {
            bpm,
            wal: Mutex::new(wal),
            txn_manager,
            metadata: Arc::new(metadata),
            lsm,
            sync_mode: options.sync_mode,
            turtle_path,
        })
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    pub fn txn_manager(&self) -> &Arc<TxnManager> {
        &self.txn_manager
    }

    pub fn metadata(&self) -> &Arc<MetadataTable> {
        &self.metadata
    }

    pub fn lsm(&self) -> &Arc<LsmTree> {
        &self.lsm
    }

    pub(crate) fn wal(&self) -> &Mutex<Wal> {
        &self.wal
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    /// Flush every dirty buffer-pool page and fsync the underlying file.
    pub fn checkpoint(&self) -> Result<()> {
        self.bpm.flush_all_pages()?;
        self.bpm.disk_manager().lock().checkpoint()?;
        TurtleRecord::new(self.metadata.root_page_id()).write(&self.turtle_path)?;
        debug!("checkpoint complete");
        Ok(())
    }
}
