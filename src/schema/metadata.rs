//! The metadata table: a reserved B-tree mapping a resource's URI to its
//! configuration string, the way every table/file/LSM-tree's schema is
//! recorded in the original engine's metadata file.

use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::error::Result;
use crate::common::PageId;
use crate::index::btree;
use crate::index::BTree;

/// `uri -> config string` table, itself just another B-tree.
pub struct MetadataTable {
    tree: BTree,
}

impl MetadataTable {
    pub fn create(bpm: Arc<BufferPoolManager>) -> Result<Self> {
        Ok(Self { tree: BTree::create(bpm)? })
    }

    pub fn open(bpm: Arc<BufferPoolManager>, root: PageId) -> Self {
        Self { tree: BTree::open(bpm, root) }
    }

    pub fn root_page_id(&self) -> PageId {
        self.tree.root_page_id()
    }

    pub fn get(&self, uri: &str) -> Result<Option<String>> {
        let value = self.tree.search(uri.as_bytes())?;
        Ok(value.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub fn set(&self, uri: &str, config: &str) -> Result<()> {
        self.tree.insert(uri.as_bytes().to_vec(), config.as_bytes().to_vec())
    }

    pub fn remove(&self, uri: &str) -> Result<()> {
        self.tree.delete(uri.as_bytes())
    }

    /// Every `(uri, config)` pair currently recorded, in key order.
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let entries = btree::collect_all(&self.tree)?;
        Ok(entries
            .into_iter()
            .map(|(k, v)| (String::from_utf8_lossy(&k).into_owned(), String::from_utf8_lossy(&v).into_owned()))
            .collect())
    }
}
