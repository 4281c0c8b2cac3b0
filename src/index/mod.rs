//! Index structures built on top of the block manager and buffer pool.
//!
//! [`btree`] is the only index type implemented; the system overview's
//! LSM-tiered variant composes it as the per-chunk index (see
//! [`crate::lsm`]).

pub mod btree;

pub use btree::BTree;
