//! B-tree index implementation.
//!
//! A disk-backed B+tree-style index over byte-string keys, built on the
//! shared buffer pool and block manager. Internal nodes hold separator
//! keys and child page ids; leaves hold the actual key/value pairs.
//! Structural changes (split) are propagated up the descent path collected
//! during the operation, classic textbook style rather than true
//! lock-coupling — concurrent structural modifications are serialized by
//! `structure_mutex`.

mod node;

pub use node::{Node, MAX_KEYS};

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::{Error, PageId, Result};

/// A disk-backed B-tree keyed by arbitrary byte strings.
///
/// # Concurrency
/// Point lookups (`search`) only take page read guards and can run
/// concurrently. Structural modifications (`insert`, `delete`) serialize
/// on `structure_mutex` — giving up lock-free descents for a much simpler
/// split/merge story, matching this engine's "correctness first, optimize
/// later" posture for the index layer.
pub struct BTree {
    bpm: std::sync::Arc<BufferPoolManager>,
    root: Mutex<PageId>,
    structure_mutex: Mutex<()>,
}

impl BTree {
    /// Create a new, empty B-tree (a single empty leaf as root).
    pub fn create(bpm: std::sync::Arc<BufferPoolManager>) -> Result<Self> {
        let root_id = {
            let mut guard = bpm.new_page()?;
            let node = Node::new_leaf();
            node.write_to_page(&mut guard)?;
            guard.page_id()
        };
        Ok(Self {
            bpm,
            root: Mutex::new(root_id),
            structure_mutex: Mutex::new(()),
        })
    }

    /// Reopen a B-tree whose root is already at `root_id`.
    pub fn open(bpm: std::sync::Arc<BufferPoolManager>, root_id: PageId) -> Self {
        Self {
            bpm,
            root: Mutex::new(root_id),
            structure_mutex: Mutex::new(()),
        }
    }

    pub fn root_page_id(&self) -> PageId {
        *self.root.lock()
    }

    /// Point lookup. Returns `Ok(None)` if the key doesn't exist.
    pub fn search(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut page_id = self.root_page_id();
        loop {
            let guard = self.bpm.fetch_page_read(page_id)?;
            let node = Node::read_from_page(&guard)?;
            match node {
                Node::Leaf { entries } => {
                    return Ok(entries
                        .iter()
                        .find(|(k, _)| k.as_slice() == key)
                        .map(|(_, v)| v.clone()));
                }
                Node::Internal { keys, children } => {
                    let idx = upper_bound(&keys, key);
                    page_id = children[idx];
                }
            }
        }
    }

    /// Insert or overwrite `key` with `value`.
    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.insert_impl(key, value, false)
    }

    /// Insert `key` only if absent; returns `Error::DuplicateKey` otherwise,
    /// leaving the existing value untouched.
    pub fn insert_no_overwrite(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.insert_impl(key, value, true)
    }

    fn insert_impl(&self, key: Vec<u8>, value: Vec<u8>, no_overwrite: bool) -> Result<()> {
        let _guard = self.structure_mutex.lock();

        let mut path: Vec<PageId> = Vec::new();
        let mut page_id = self.root_page_id();
        loop {
            path.push(page_id);
            let node = {
                let guard = self.bpm.fetch_page_read(page_id)?;
                Node::read_from_page(&guard)?
            };
            match node {
                Node::Leaf { .. } => break,
                Node::Internal { keys, children } => {
                    let idx = upper_bound(&keys, &key);
                    page_id = children[idx];
                }
            }
        }

        let leaf_id = *path.last().unwrap();
        let mut leaf = {
            let guard = self.bpm.fetch_page_read(leaf_id)?;
            Node::read_from_page(&guard)?
        };
        if let Node::Leaf { entries } = &mut leaf {
            match entries.binary_search_by(|(k, _)| k.as_slice().cmp(key.as_slice())) {
                Ok(pos) if no_overwrite => return Err(Error::DuplicateKey),
                Ok(pos) => entries[pos].1 = value,
                Err(pos) => entries.insert(pos, (key, value)),
            }
        }

        if !leaf.is_overflowing() {
            self.write_node(leaf_id, &leaf)?;
            return Ok(());
        }
        Self::ensure_splittable(&leaf)?;

        let (mut separator, mut right) = leaf.split();
        self.write_node(leaf_id, &leaf)?;
        let mut right_id = self.alloc_node(&right)?;

        // Propagate the split upward through the collected path.
        path.pop(); // leaf already handled
        while let Some(parent_id) = path.pop() {
            let mut parent = {
                let guard = self.bpm.fetch_page_read(parent_id)?;
                Node::read_from_page(&guard)?
            };
            if let Node::Internal { keys, children } = &mut parent {
                let idx = upper_bound(keys, &separator);
                keys.insert(idx, separator.clone());
                children.insert(idx + 1, right_id);
            }

            if !parent.is_overflowing() {
                self.write_node(parent_id, &parent)?;
                return Ok(());
            }
            Self::ensure_splittable(&parent)?;
            let (new_sep, new_right) = parent.split();
            self.write_node(parent_id, &parent)?;
            separator = new_sep;
            right = new_right;
            right_id = self.alloc_node(&right)?;
        }

        // The root itself split: grow the tree by one level.
        let old_root = self.root_page_id();
        let new_root = Node::Internal {
            keys: vec![separator],
            children: vec![old_root, right_id],
        };
        let new_root_id = self.alloc_node(&new_root)?;
        *self.root.lock() = new_root_id;
        Ok(())
    }

    /// Remove `key`. Returns an error if it doesn't exist. Leaves are not
    /// merged back together on underflow — a shallow, mostly-empty tree is
    /// left to be reclaimed at the next compaction rather than rebalanced
    /// inline.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _guard = self.structure_mutex.lock();

        let mut page_id = self.root_page_id();
        loop {
            let node = {
                let guard = self.bpm.fetch_page_read(page_id)?;
                Node::read_from_page(&guard)?
            };
            match node {
                Node::Leaf { mut entries } => {
                    let pos = entries
                        .iter()
                        .position(|(k, _)| k.as_slice() == key)
                        .ok_or(Error::NotFound)?;
                    entries.remove(pos);
                    self.write_node(page_id, &Node::Leaf { entries })?;
                    return Ok(());
                }
                Node::Internal { keys, children } => {
                    let idx = upper_bound(&keys, key);
                    page_id = children[idx];
                }
            }
        }
    }

    fn write_node(&self, page_id: PageId, node: &Node) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(page_id)?;
        node.write_to_page(&mut guard)?;
        Ok(())
    }

    fn alloc_node(&self, node: &Node) -> Result<PageId> {
        let mut guard = self.bpm.new_page()?;
        node.write_to_page(&mut guard)?;
        Ok(guard.page_id())
    }

    /// `split()` halves a node's element count; a node at or below one
    /// element can't be made any smaller, so an overflowing one this size
    /// means a single record is too large for one page outright.
    fn ensure_splittable(node: &Node) -> Result<()> {
        if node.element_count() <= 1 {
            return Err(Error::RecordTooLarge {
                size: node.encoded_size(),
                capacity: crate::storage::page::Page::body_capacity(),
            });
        }
        Ok(())
    }
}

/// Index of the first child whose subtree may contain `key`: the count of
/// separator keys less than or equal to `key`.
fn upper_bound(keys: &[Vec<u8>], key: &[u8]) -> usize {
    keys.partition_point(|k| k.as_slice() <= key)
}

/// Collect every `(key, value)` pair in `tree`, in key order.
///
/// A stand-in for a proper range cursor: callers that need to stream a
/// whole tree (Bloom filter construction, LSM merge) use this rather than
/// point lookups.
pub fn collect_all(tree: &BTree) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut out = Vec::new();
    collect_subtree(tree, tree.root_page_id(), &mut out)?;
    Ok(out)
}

fn collect_subtree(tree: &BTree, page_id: PageId, out: &mut Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
    let node = {
        let guard = tree.bpm.fetch_page_read(page_id)?;
        Node::read_from_page(&guard)?
    };
    match node {
        Node::Leaf { entries } => out.extend(entries),
        Node::Internal { children, .. } => {
            for child in children {
                collect_subtree(tree, child, out)?;
            }
        }
    }
    Ok(())
}
