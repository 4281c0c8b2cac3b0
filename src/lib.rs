//! InterchangeDB - An embedded transactional key/value storage engine with
//! runtime-swappable buffer pool eviction policies.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         InterchangeDB                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │        Connection / Session Layer (conn/)                │   │
//! │  │   Connection (shared handles) + Session (per-thread txn) │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │     Schema / Metadata Layer (schema/)                    │   │
//! │  │   MetadataTable + TurtleRecord + SchemaChangeTracker      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │       Transaction / WAL Layer (txn/)                     │   │
//! │  │     TxnManager + MVCC visibility + Wal + recovery         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │       LSM Orchestration (lsm/)                           │   │
//! │  │   LsmTree (chunks) + BloomFilter + merge/flush policy     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │       Index Layer (index/)                                │   │
//! │  │              B-tree (each LSM chunk is one)               │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │       Buffer Pool (buffer/)  [Runtime Swappable]        │   │
//! │  │   ┌─────────────────────────────────────────────────┐   │   │
//! │  │   │  Eviction Policies: FIFO | LRU (pluggable trait) │   │   │
//! │  │   │            (hot-swappable at runtime)            │   │   │
//! │  │   └─────────────────────────────────────────────────┘   │   │
//! │  │      BufferPoolManager + Frame + Statistics              │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │     DiskManager + Page + PageHeader                       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, TxnId, Lsn, Error, config)
//! - [`buffer`] - Buffer pool management and eviction policies
//! - [`storage`] - Disk I/O and page formats
//! - [`index`] - Index structures (B-tree)
//! - [`txn`] - Transactions, write-ahead log, and crash recovery
//! - [`lsm`] - LSM chunk orchestration and Bloom filters
//! - [`schema`] - Metadata table and schema-change tracking
//! - [`conn`] - Connection and session handles
//!
//! # Quick Start
//! ```no_run
//! use interchangedb::conn::{Connection, ConnectionOptions, Session};
//! use std::sync::Arc;
//!
//! let conn = Arc::new(Connection::open("my_database", ConnectionOptions::default()).unwrap());
//! let mut session = Session::new(conn);
//! session.begin_transaction().unwrap();
//! session.put(b"key".to_vec(), b"value".to_vec()).unwrap();
//! session.commit().unwrap();
//! ```

// Core modules
pub mod buffer;
pub mod common;
pub mod conn;
pub mod index;
pub mod lsm;
pub mod schema;
pub mod storage;
pub mod txn;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, PageId, Result};

pub use buffer::{BufferPoolStats, Frame, StatsSnapshot, BufferPoolManager};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
